//! Writing compiled program files.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cache::format::{
    self, AutoloadStyle, ByteOrder, Descriptor, FLAG_MAP, FLAG_OTHER, MAX_OTHER_OFFSET, MapPolicy,
    PRELUDE_WORDS,
};
use crate::compiler::{CompileOptions, Compiler};
use crate::error::CacheError;
use crate::lexer::Lexer;
use crate::wordcode::program::Program;

#[derive(Debug)]
struct Entry {
    name: String,
    program: Rc<Program>,
    style: AutoloadStyle,
}

impl Entry {
    fn body_bytes(&self) -> usize {
        self.program.len() * 4 + self.program.strings().len()
    }

    fn body_words(&self) -> usize {
        self.body_bytes().div_ceil(4)
    }

    fn descriptor(&self, start: usize) -> Descriptor {
        let tail = self.name.rfind('/').map_or(0, |slash| slash + 1);
        Descriptor {
            start: start as u32,
            len: self.body_bytes() as u32,
            pattern_count: self.program.pattern_count() as u32,
            strings_offset: (self.program.len() * 4) as u32,
            header_words: (format::DESCRIPTOR_WORDS + Descriptor::name_words(&self.name)) as u32,
            style: self.style,
            tail: tail as u32,
            name: self.name.clone(),
        }
    }
}

/// Collects programs and writes them as one cache file.
#[derive(Debug)]
pub struct DumpWriter {
    entries: Vec<Entry>,
    policy: MapPolicy,
    order: ByteOrder,
    style: AutoloadStyle,
    options: CompileOptions,
}

impl Default for DumpWriter {
    fn default() -> Self {
        Self::new(MapPolicy::default())
    }
}

impl DumpWriter {
    /// Creates an empty writer in the host's byte order.
    pub fn new(policy: MapPolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
            order: ByteOrder::native(),
            style: AutoloadStyle::Unspecified,
            options: CompileOptions::default(),
        }
    }

    /// Writes the first image in `order` instead of the host's.
    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Options used by [`DumpWriter::add_source_file`].
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Autoload style recorded for source files added from now on.
    pub fn set_style(&mut self, style: AutoloadStyle) {
        self.style = style;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an already compiled program.
    pub fn add_program(&mut self, name: impl Into<String>, program: Rc<Program>, style: AutoloadStyle) {
        self.entries.push(Entry {
            name: name.into(),
            program,
            style,
        });
    }

    /// Compiles a source file and adds it under its path.
    ///
    /// The arguments `-k` and `-z` are not files: they switch the autoload
    /// style of the files that follow to ksh or zsh.
    pub fn add_source_file(&mut self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let path = path.as_ref();
        match path.to_str() {
            Some("-k") => {
                self.style = AutoloadStyle::Ksh;
                return Ok(());
            }
            Some("-z") => {
                self.style = AutoloadStyle::Zsh;
                return Ok(());
            }
            _ => {}
        }

        let metadata = fs::metadata(path).map_err(|e| CacheError::io(path, e))?;
        if !metadata.is_file() {
            return Err(CacheError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let bytes = fs::read(path).map_err(|e| CacheError::io(path, e))?;
        let text = String::from_utf8_lossy(&bytes);
        let program = Compiler::new(Lexer::new(&text), self.options)
            .compile_list()
            .map_err(|source| CacheError::Compile {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("compiled {} ({} words)", path.display(), program.len());
        self.add_program(path.to_string_lossy(), program, self.style);
        Ok(())
    }

    /// Encodes both images.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        self.encode(Path::new(""))
    }

    fn encode(&self, path: &Path) -> Result<Vec<u8>, CacheError> {
        if self.entries.is_empty() {
            return Err(CacheError::NoPrograms);
        }
        let header_words = PRELUDE_WORDS
            + self
                .entries
                .iter()
                .map(|e| format::DESCRIPTOR_WORDS + Descriptor::name_words(&e.name))
                .sum::<usize>();
        let body_words: usize = self.entries.iter().map(Entry::body_words).sum();
        let image_bytes = (header_words + body_words) * 4;
        if image_bytes > MAX_OTHER_OFFSET {
            return Err(CacheError::TooLarge {
                path: path.to_path_buf(),
                bytes: image_bytes,
            });
        }
        let map = self.policy.maps(image_bytes);

        let mut out = Vec::with_capacity(image_bytes * 2);
        for (order, other) in [(self.order, 0), (self.order.opposite(), FLAG_OTHER)] {
            let flags = (if map { FLAG_MAP } else { 0 }) | other;
            format::encode_prelude(order, flags, image_bytes, &mut out);
            let mut start = header_words;
            for entry in &self.entries {
                entry.descriptor(start).encode(order, &mut out);
                start += entry.body_words();
            }
            for entry in &self.entries {
                let body_start = out.len();
                for word in entry.program.words().iter() {
                    order.write_word(*word, &mut out);
                }
                out.extend_from_slice(entry.program.strings());
                out.resize(body_start + entry.body_words() * 4, 0);
            }
        }
        Ok(out)
    }

    /// Writes the file, adding the `.zwc` extension when missing, and
    /// returns the path written.
    ///
    /// The file is assembled under a temporary name next to the
    /// destination and renamed into place, so a failure never leaves a
    /// partial file under the final name.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<PathBuf, CacheError> {
        let path = with_extension(path.as_ref());
        let bytes = self.encode(&path)?;

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&path, e)),
        }
        let temporary = temporary_path(&path);
        let written = fs::File::create(&temporary)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temporary, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temporary);
            log::warn!("writing {} failed: {e}", path.display());
            return Err(CacheError::io(&path, e));
        }
        log::debug!(
            "wrote {} ({} programs, {} bytes)",
            path.display(),
            self.entries.len(),
            bytes.len()
        );
        Ok(path)
    }
}

/// Appends `.zwc` unless `path` already ends in it.
pub fn with_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == format::EXTENSION) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(format::EXTENSION);
        PathBuf::from(name)
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".tmp{}", std::process::id()));
    PathBuf::from(name)
}
