//! Finding and loading programs from cache files.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

use crate::cache::format::{self, AutoloadStyle, ByteOrder, Descriptor, DumpHeader, HeaderProblem, PRELUDE_WORDS};
use crate::cache::segment::{Segment, SegmentKey, SegmentRegistry};
use crate::cache::writer::with_extension;
use crate::error::CacheError;
use crate::wordcode::program::Program;

/// Reads and validates the header of the image matching `order`.
///
/// The other image's prelude is checked too, so a file damaged in either
/// half is rejected as a whole.
pub fn load_header(path: impl AsRef<Path>, order: ByteOrder) -> Result<DumpHeader, CacheError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| CacheError::io(path, e))?;
    read_header(&mut file, path, order)
}

fn problem(path: &Path, problem: HeaderProblem) -> CacheError {
    let path = path.to_path_buf();
    match problem {
        HeaderProblem::BadMagic => CacheError::BadMagic { path },
        HeaderProblem::Version(found) => CacheError::VersionMismatch {
            path,
            found,
            expected: format::FORMAT_VERSION,
        },
        HeaderProblem::Truncated => CacheError::Truncated { path },
    }
}

fn file_len(file: &File, path: &Path) -> Result<usize, CacheError> {
    let len = file.metadata().map_err(|e| CacheError::io(path, e))?.len();
    Ok(usize::try_from(len).unwrap_or(usize::MAX))
}

fn truncated(path: &Path) -> CacheError {
    CacheError::Truncated {
        path: path.to_path_buf(),
    }
}

/// Reads `len` bytes at `offset`, never past the end of the file.
fn read_exact_at(file: &mut File, path: &Path, offset: usize, len: usize) -> Result<Vec<u8>, CacheError> {
    let end = offset.checked_add(len).ok_or_else(|| truncated(path))?;
    if end > file_len(file, path)? {
        return Err(truncated(path));
    }
    let mut bytes = vec![0; len];
    file.seek(SeekFrom::Start(offset as u64))
        .and_then(|_| file.read_exact(&mut bytes))
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => truncated(path),
            _ => CacheError::io(path, e),
        })?;
    Ok(bytes)
}

fn read_header(file: &mut File, path: &Path, order: ByteOrder) -> Result<DumpHeader, CacheError> {
    let prelude_len = (PRELUDE_WORDS + 1) * 4;
    let first = read_exact_at(file, path, 0, prelude_len)?;
    let (prelude, version) = format::decode_prelude(&first, order).map_err(|p| problem(path, p))?;
    if version != format::FORMAT_VERSION {
        return Err(problem(path, HeaderProblem::Version(version)));
    }

    let (image_offset, alternate_offset) = if prelude.native {
        (0, prelude.other_offset)
    } else {
        (prelude.other_offset, 0)
    };

    // The alternate image must read swapped in this order.
    let alternate = read_exact_at(file, path, alternate_offset, prelude_len)?;
    match format::decode_prelude(&alternate, order) {
        Ok((alt, alt_version)) if !alt.native && alt_version == format::FORMAT_VERSION => {}
        Ok((_, alt_version)) if alt_version != format::FORMAT_VERSION => {
            return Err(problem(path, HeaderProblem::Version(alt_version)));
        }
        Ok(_) => return Err(problem(path, HeaderProblem::BadMagic)),
        Err(p) => return Err(problem(path, p)),
    }

    let image = if prelude.native {
        first
    } else {
        read_exact_at(file, path, image_offset, prelude_len)?
    };
    let (own, _) = format::decode_prelude(&image, order).map_err(|p| problem(path, p))?;
    let image_end = if prelude.native {
        prelude.other_offset
    } else {
        file_len(file, path)?
    };
    let header_bytes = own.header_words.checked_mul(4).ok_or_else(|| truncated(path))?;
    if image_offset.saturating_add(header_bytes) > image_end {
        return Err(truncated(path));
    }
    let bytes = read_exact_at(file, path, image_offset, header_bytes)?;
    DumpHeader::decode(&bytes, order, image_offset).map_err(|p| problem(path, p))
}

/// Loads programs from cache files, sharing mappings between loads.
#[derive(Debug)]
pub struct CacheLoader {
    registry: SegmentRegistry,
    order: ByteOrder,
}

impl Default for CacheLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// A program found in a cache file.
#[derive(Debug, Clone)]
pub struct LoadedProgram {
    pub program: Rc<Program>,
    pub style: AutoloadStyle,
}

impl CacheLoader {
    /// Creates a loader reading in the host's byte order.
    pub fn new() -> Self {
        Self::with_order(ByteOrder::native())
    }

    /// Creates a loader that reads files as a host of `order` would.
    pub fn with_order(order: ByteOrder) -> Self {
        Self {
            registry: SegmentRegistry::new(),
            order,
        }
    }

    /// Segments mapped by this loader.
    pub fn registry(&self) -> &SegmentRegistry {
        &self.registry
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Loads the program `name` from the cache file at `path`.
    ///
    /// Any problem with the file yields `None`, so callers fall back to
    /// compiling the source.
    pub fn load(&self, path: impl AsRef<Path>, name: &str) -> Option<Rc<Program>> {
        self.lookup(path.as_ref(), name).map(|loaded| loaded.program)
    }

    /// Like [`CacheLoader::load`], also reporting the autoload style.
    pub fn lookup(&self, path: &Path, name: &str) -> Option<LoadedProgram> {
        match self.try_load(path, name) {
            Ok(found) => found,
            Err(error) => {
                log::debug!("ignoring cache file: {error}");
                None
            }
        }
    }

    /// Returns `true` when the cache file holds a program called `name`.
    pub fn contains(&self, path: impl AsRef<Path>, name: &str) -> bool {
        load_header(path, self.order).is_ok_and(|header| header.find(name).is_some())
    }

    fn try_load(&self, path: &Path, name: &str) -> Result<Option<LoadedProgram>, CacheError> {
        let metadata = fs::metadata(path).map_err(|e| CacheError::io(path, e))?;
        let key = SegmentKey::of(&metadata, path);

        if let Some(segment) = self.registry.get(key) {
            let start = image_start(&segment, self.order);
            let header = DumpHeader::decode(segment.bytes().get(start..).unwrap_or(&[]), self.order, start)
                .map_err(|p| problem(path, p))?;
            let Some(descriptor) = header.find(name) else {
                return Ok(None);
            };
            check_body(path, &header, descriptor, segment.bytes().len())?;
            return Ok(Some(LoadedProgram {
                program: mapped_program(Rc::clone(&segment), &header, descriptor),
                style: descriptor.style,
            }));
        }

        let mut file = File::open(path).map_err(|e| CacheError::io(path, e))?;
        let header = read_header(&mut file, path, self.order)?;
        let Some(descriptor) = header.find(name) else {
            return Ok(None);
        };

        check_body(path, &header, descriptor, file_len(&file, path)?)?;

        let program = if header.mapped {
            let segment = self.registry.map(path, key).map_err(|e| CacheError::io(path, e))?;
            check_body(path, &header, descriptor, segment.bytes().len())?;
            mapped_program(segment, &header, descriptor)
        } else {
            let offset = header.image_offset + descriptor.start as usize * 4;
            let body = read_exact_at(&mut file, path, offset, descriptor.len as usize)?;
            read_program(&body, descriptor, self.order)
        };
        Ok(Some(LoadedProgram {
            program,
            style: descriptor.style,
        }))
    }

    /// Loads a sourced file's program from `file.zwc` when that is at
    /// least as new as `file` (or `file` is gone). A path already ending
    /// in `.zwc` is used directly.
    pub fn try_source_file(&self, file: impl AsRef<Path>) -> Option<Rc<Program>> {
        let file = file.as_ref();
        let name = file.file_name()?.to_str()?;
        if has_extension(file) {
            return self.load(file, name);
        }
        let compiled = with_extension(file);
        if !newer_or_alone(&compiled, file) {
            return None;
        }
        self.load(&compiled, name)
    }

    /// Loads function `name` for an autoload directory `dir`: first from
    /// the digest `dir.zwc`, then from the per-function `file.zwc`. Each
    /// is used only when at least as new as what it was compiled from.
    pub fn try_dump_file(
        &self,
        dir: impl AsRef<Path>,
        name: &str,
        file: impl AsRef<Path>,
    ) -> Option<Rc<Program>> {
        let dir = dir.as_ref();
        let file = file.as_ref();
        if has_extension(dir) {
            return self.load(dir, name);
        }
        let digest = with_extension(dir);
        let compiled = with_extension(file);
        if newer_or_alone(&digest, &compiled) && newer_or_alone(&digest, file) {
            if let Some(program) = self.load(&digest, name) {
                return Some(program);
            }
        }
        if newer_or_alone(&compiled, file) {
            return self.load(&compiled, name);
        }
        None
    }
}

fn has_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == format::EXTENSION)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// `candidate` exists and is not older than `other`, or `other` is missing.
fn newer_or_alone(candidate: &Path, other: &Path) -> bool {
    match (modified(candidate), modified(other)) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(candidate), Some(other)) => candidate >= other,
    }
}

/// Checks that a program body lies inside its image before anything is
/// allocated for it or aliased from it.
fn check_body(
    path: &Path,
    header: &DumpHeader,
    descriptor: &Descriptor,
    file_len: usize,
) -> Result<(), CacheError> {
    let image_end = if header.is_other {
        file_len
    } else {
        header.other_offset.min(file_len)
    };
    let end = (descriptor.start as usize)
        .checked_mul(4)
        .and_then(|start| start.checked_add(header.image_offset))
        .and_then(|start| start.checked_add(descriptor.len as usize));
    let split_ok = descriptor.strings_offset <= descriptor.len && descriptor.strings_offset % 4 == 0;
    match end {
        Some(end) if end <= image_end && split_ok => Ok(()),
        _ => Err(truncated(path)),
    }
}

/// Byte offset of the image a reader of `order` uses in a mapped file.
fn image_start(segment: &Segment, order: ByteOrder) -> usize {
    match format::decode_prelude(segment.bytes(), order) {
        Ok((prelude, _)) if !prelude.native => prelude.other_offset,
        _ => 0,
    }
}

fn mapped_program(
    segment: Rc<Segment>,
    header: &DumpHeader,
    descriptor: &Descriptor,
) -> Rc<Program> {
    let code_offset = header.image_offset + descriptor.start as usize * 4;
    let strings_offset = descriptor.strings_offset as usize;
    Program::mapped(
        segment,
        code_offset,
        strings_offset / 4,
        code_offset + strings_offset,
        (descriptor.len - descriptor.strings_offset) as usize,
        descriptor.pattern_count as usize,
        header.order,
    )
}

fn read_program(body: &[u8], descriptor: &Descriptor, order: ByteOrder) -> Rc<Program> {
    let split = descriptor.strings_offset as usize;
    let code = body[..split].chunks_exact(4).map(|word| order.read_word(word)).collect();
    Program::from_parts(
        code,
        body[split..].to_vec(),
        descriptor.pattern_count as usize,
        false,
    )
}
