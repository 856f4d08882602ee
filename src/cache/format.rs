//! On-disk layout of compiled program files.
//!
//! A file holds the same image twice: first in the writer's byte order,
//! then in the opposite one. Each image is:
//!
//! ```text
//! word 0        magic
//! word 1        flags byte, then the byte offset of the second image (24 bits)
//! words 2..12   version, NUL padded
//! descriptors   start, len, npats, strs, hlen, flags|tail<<2, name
//! bodies        code words, then the string table, padded to a word
//! ```
//!
//! The first descriptor's `start` doubles as the header length in words.

use std::fmt;

use crate::wordcode::code::Wordcode;

/// File name extension of compiled program files.
pub const EXTENSION: &str = "zwc";

/// Words before the first descriptor.
pub const PRELUDE_WORDS: usize = 12;
/// Magic number as read in the writer's byte order.
pub const MAGIC: Wordcode = 0x0405_0607;
/// Magic number as read in the opposite byte order.
pub const OTHER_MAGIC: Wordcode = 0x0706_0504;
/// File flag: programs should be mapped rather than read.
pub const FLAG_MAP: u8 = 1;
/// File flag: this is the second, byte-swapped image.
pub const FLAG_OTHER: u8 = 2;
/// Bytes reserved for the version string.
pub const VERSION_BYTES: usize = 40;
/// Files at least this large are mapped under [`MapPolicy::Auto`].
pub const MIN_MAP_BYTES: usize = 4096;
/// Words in a descriptor before its name.
pub const DESCRIPTOR_WORDS: usize = 6;
/// Largest offset of the second image.
pub const MAX_OTHER_OFFSET: usize = (1 << 24) - 1;

/// Version string recorded in every file.
pub const FORMAT_VERSION: &str = concat!("wordcode-", env!("CARGO_PKG_VERSION"));

/// Byte order of a file image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the running host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// The other byte order, used for the second image.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Little => Self::Big,
            Self::Big => Self::Little,
        }
    }

    /// Decodes the first four bytes of `bytes`; missing bytes read as END.
    pub fn read_word(self, bytes: &[u8]) -> Wordcode {
        let Some(raw) = bytes.get(..4).and_then(|b| <[u8; 4]>::try_from(b).ok()) else {
            return 0;
        };
        match self {
            Self::Little => u32::from_le_bytes(raw),
            Self::Big => u32::from_be_bytes(raw),
        }
    }

    /// Appends `word` in this order.
    pub fn write_word(self, word: Wordcode, out: &mut Vec<u8>) {
        let raw = match self {
            Self::Little => word.to_le_bytes(),
            Self::Big => word.to_be_bytes(),
        };
        out.extend_from_slice(&raw);
    }
}

/// When the loader maps a file instead of reading programs from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapPolicy {
    /// Always read.
    Never,
    /// Map files of at least [`MIN_MAP_BYTES`].
    #[default]
    Auto,
    /// Always map.
    Always,
}

impl MapPolicy {
    /// Resolves the policy for a file of `total_bytes`.
    pub fn maps(self, total_bytes: usize) -> bool {
        match self {
            Self::Never => false,
            Self::Auto => total_bytes >= MIN_MAP_BYTES,
            Self::Always => true,
        }
    }
}

/// How an autoloaded function file is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutoloadStyle {
    /// Follow the loading shell's option.
    #[default]
    Unspecified,
    /// The file runs and defines the function (ksh style).
    Ksh,
    /// The file is the function body (zsh style).
    Zsh,
}

impl AutoloadStyle {
    /// Descriptor flag bit for ksh-style loading.
    pub const KSH_BIT: u32 = 1;
    /// Descriptor flag bit for zsh-style loading.
    pub const ZSH_BIT: u32 = 2;

    /// Flag bits stored in the low bits of a descriptor's last word.
    pub fn bits(self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Ksh => Self::KSH_BIT,
            Self::Zsh => Self::ZSH_BIT,
        }
    }

    /// Decodes descriptor flag bits; ksh wins when both are set.
    pub fn from_bits(bits: u32) -> Self {
        if bits & Self::KSH_BIT != 0 {
            Self::Ksh
        } else if bits & Self::ZSH_BIT != 0 {
            Self::Zsh
        } else {
            Self::Unspecified
        }
    }
}

/// One program descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Offset of the body in words from the start of the image.
    pub start: u32,
    /// Bytes of code plus strings.
    pub len: u32,
    /// Pattern slots the program needs.
    pub pattern_count: u32,
    /// Byte offset of the string table within the body.
    pub strings_offset: u32,
    /// Descriptor length in words, name included.
    pub header_words: u32,
    pub style: AutoloadStyle,
    /// Byte index where the name's last path component starts.
    pub tail: u32,
    /// Name as given to the writer.
    pub name: String,
}

impl Descriptor {
    /// Lookup key: the last path component of the name.
    pub fn short_name(&self) -> &str {
        self.name.get(self.tail as usize..).unwrap_or(&self.name)
    }

    /// Words a name occupies: NUL terminated and padded to a word.
    pub fn name_words(name: &str) -> usize {
        (name.len() + 4) / 4
    }

    pub(crate) fn encode(&self, order: ByteOrder, out: &mut Vec<u8>) {
        for word in [
            self.start,
            self.len,
            self.pattern_count,
            self.strings_offset,
            self.header_words,
            self.style.bits() | (self.tail << 2),
        ] {
            order.write_word(word, out);
        }
        let padded = Self::name_words(&self.name) * 4;
        out.extend_from_slice(self.name.as_bytes());
        out.resize(out.len() + padded - self.name.len(), 0);
    }
}

/// Decoded header of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHeader {
    /// Byte order the image was decoded in.
    pub order: ByteOrder,
    /// Byte offset of this image within the file.
    pub image_offset: usize,
    /// Byte offset of the second image.
    pub other_offset: usize,
    /// Programs should be mapped.
    pub mapped: bool,
    /// This is the second image.
    pub is_other: bool,
    pub version: String,
    pub descriptors: Vec<Descriptor>,
}

/// Why an image header could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderProblem {
    BadMagic,
    Version(String),
    Truncated,
}

impl fmt::Display for HeaderProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => f.write_str("bad magic"),
            Self::Version(found) => write!(f, "version {found}"),
            Self::Truncated => f.write_str("truncated"),
        }
    }
}

/// Prelude fields common to both images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Prelude {
    /// The magic matched in the requested order (else it matched swapped).
    pub native: bool,
    pub flags: u8,
    pub other_offset: usize,
    /// Header length in words, from the first descriptor.
    pub header_words: usize,
}

/// Decodes the first `PRELUDE_WORDS + 1` words of an image.
pub(crate) fn decode_prelude(bytes: &[u8], order: ByteOrder) -> Result<(Prelude, String), HeaderProblem> {
    if bytes.len() < (PRELUDE_WORDS + 1) * 4 {
        return Err(HeaderProblem::Truncated);
    }
    let native = match order.read_word(bytes) {
        MAGIC => true,
        OTHER_MAGIC => false,
        _ => return Err(HeaderProblem::BadMagic),
    };
    let version_bytes = &bytes[8..8 + VERSION_BYTES];
    let end = version_bytes.iter().position(|&b| b == 0).unwrap_or(VERSION_BYTES);
    let version = String::from_utf8_lossy(&version_bytes[..end]).into_owned();
    let prelude = Prelude {
        native,
        flags: bytes[4],
        other_offset: usize::from(bytes[5]) | usize::from(bytes[6]) << 8 | usize::from(bytes[7]) << 16,
        header_words: order.read_word(&bytes[PRELUDE_WORDS * 4..]) as usize,
    };
    Ok((prelude, version))
}

/// Encodes an image prelude: magic in `order`, then the order-free bytes.
pub(crate) fn encode_prelude(order: ByteOrder, flags: u8, other_offset: usize, out: &mut Vec<u8>) {
    order.write_word(MAGIC, out);
    out.push(flags);
    out.push((other_offset & 0xff) as u8);
    out.push(((other_offset >> 8) & 0xff) as u8);
    out.push(((other_offset >> 16) & 0xff) as u8);
    let mut version = [0u8; VERSION_BYTES];
    let len = FORMAT_VERSION.len().min(VERSION_BYTES - 1);
    version[..len].copy_from_slice(&FORMAT_VERSION.as_bytes()[..len]);
    out.extend_from_slice(&version);
}

impl DumpHeader {
    /// Decodes a complete image header (`header_words` words).
    pub(crate) fn decode(
        bytes: &[u8],
        order: ByteOrder,
        image_offset: usize,
    ) -> Result<Self, HeaderProblem> {
        let (prelude, version) = decode_prelude(bytes, order)?;
        if !prelude.native {
            return Err(HeaderProblem::BadMagic);
        }
        if version != FORMAT_VERSION {
            return Err(HeaderProblem::Version(version));
        }
        let end = prelude.header_words * 4;
        if end > bytes.len() || prelude.header_words <= PRELUDE_WORDS {
            return Err(HeaderProblem::Truncated);
        }

        let mut descriptors = Vec::new();
        let mut at = PRELUDE_WORDS * 4;
        while at < end {
            let word = |index: usize| order.read_word(&bytes[at + index * 4..]);
            if at + DESCRIPTOR_WORDS * 4 > end {
                return Err(HeaderProblem::Truncated);
            }
            let header_words = word(4);
            let next = at + header_words as usize * 4;
            if (header_words as usize) <= DESCRIPTOR_WORDS || next > end {
                return Err(HeaderProblem::Truncated);
            }
            let name_bytes = &bytes[at + DESCRIPTOR_WORDS * 4..next];
            let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
            let flags = word(5);
            let descriptor = Descriptor {
                start: word(0),
                len: word(1),
                pattern_count: word(2),
                strings_offset: word(3),
                header_words,
                style: AutoloadStyle::from_bits(flags & 3),
                tail: flags >> 2,
                name: String::from_utf8_lossy(&name_bytes[..name_len]).into_owned(),
            };
            if descriptor.strings_offset > descriptor.len || descriptor.strings_offset % 4 != 0 {
                return Err(HeaderProblem::Truncated);
            }
            descriptors.push(descriptor);
            at = next;
        }

        Ok(Self {
            order,
            image_offset,
            other_offset: prelude.other_offset,
            mapped: prelude.flags & FLAG_MAP != 0,
            is_other: prelude.flags & FLAG_OTHER != 0,
            version,
            descriptors,
        })
    }

    /// Names of all programs, as given to the writer.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    /// Finds a program by the last path component of its name.
    pub fn find(&self, name: &str) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.short_name() == name)
    }

    /// One-line summary, as `zcompile -t` prints before the names.
    pub fn summary(&self) -> String {
        format!(
            "zwc file ({}) for {}",
            if self.mapped { "mapped" } else { "read" },
            self.version
        )
    }
}
