//! Memory-mapped cache files shared by the programs that alias them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::fs::{File, Metadata};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use memmap2::Mmap;
use rustc_hash::FxHashMap;

/// Identity of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentKey {
    pub device: u64,
    pub inode: u64,
}

impl SegmentKey {
    /// Identity of the file behind `metadata`, (device, inode) on unix.
    #[cfg(unix)]
    pub fn of(metadata: &Metadata, _path: &Path) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        }
    }

    /// Identity of the file at `path`, a hash of its canonical path.
    #[cfg(not(unix))]
    pub fn of(_metadata: &Metadata, path: &Path) -> Self {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self {
            device: 0,
            inode: xxhash_rust::xxh3::xxh3_64(canonical.to_string_lossy().as_bytes()),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    maps: Cell<usize>,
    unmaps: Cell<usize>,
}

/// Map and unmap totals of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentStats {
    pub maps: usize,
    pub unmaps: usize,
}

/// A mapped cache file and the descriptor keeping it open.
///
/// Programs hold the segment through `Rc`; the mapping is released when
/// the last of them drops.
pub struct Segment {
    key: SegmentKey,
    path: PathBuf,
    map: Mmap,
    _file: File,
    counters: Rc<Counters>,
}

impl Segment {
    /// File identity this segment was mapped from.
    pub fn key(&self) -> SegmentKey {
        self.key
    }

    /// Path the file was opened under.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole mapped file.
    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    /// Number of live handles: the programs aliasing this segment, plus
    /// any handle the caller holds.
    pub fn ref_count(this: &Rc<Self>) -> usize {
        Rc::strong_count(this)
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        self.counters.unmaps.set(self.counters.unmaps.get() + 1);
        log::debug!("unmapping {}", self.path.display());
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("bytes", &self.map.len())
            .finish()
    }
}

/// Mapped segments by file identity.
///
/// Entries are weak: the registry never keeps a mapping alive, it only
/// lets repeated loads of one file share it.
#[derive(Debug, Default)]
pub struct SegmentRegistry {
    segments: RefCell<FxHashMap<SegmentKey, Weak<Segment>>>,
    counters: Rc<Counters>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live segment for `key`, if any.
    pub fn get(&self, key: SegmentKey) -> Option<Rc<Segment>> {
        self.segments.borrow().get(&key).and_then(Weak::upgrade)
    }

    /// Returns the live segment for `path`'s file, mapping it when needed.
    pub fn map(&self, path: &Path, key: SegmentKey) -> std::io::Result<Rc<Segment>> {
        if let Some(segment) = self.get(key) {
            return Ok(segment);
        }
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and cache files are replaced by
        // rename, never rewritten in place.
        let map = unsafe { Mmap::map(&file)? };
        self.counters.maps.set(self.counters.maps.get() + 1);
        log::debug!("mapped {} ({} bytes)", path.display(), map.len());

        let segment = Rc::new(Segment {
            key,
            path: path.to_path_buf(),
            map,
            _file: file,
            counters: Rc::clone(&self.counters),
        });
        let mut segments = self.segments.borrow_mut();
        segments.retain(|_, weak| weak.strong_count() > 0);
        segments.insert(key, Rc::downgrade(&segment));
        Ok(segment)
    }

    /// Number of segments currently mapped.
    pub fn live(&self) -> usize {
        self.segments
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Maps and unmaps performed so far.
    pub fn stats(&self) -> SegmentStats {
        SegmentStats {
            maps: self.counters.maps.get(),
            unmaps: self.counters.unmaps.get(),
        }
    }
}
