//! String references and the intern table behind them.
//!
//! A string reference is one word. Strings up to three bytes live inside the
//! word itself; longer strings are stored once per generation in the string
//! table and referenced by offset.

use xxhash_rust::xxh3::xxh3_64;

use crate::error::CompileError;
use crate::wordcode::code::Wordcode;

/// Reference to the empty string without expansion tokens.
pub const EMPTY_PLAIN: Wordcode = 6;
/// Reference to the empty string with expansion tokens.
pub const EMPTY_TOKENS: Wordcode = 7;

const INLINE_MARK: Wordcode = 2;
const TOKENS_MARK: Wordcode = 1;
const MAX_TABLE_BYTES: usize = 1 << 30;

/// Returns `true` when `text` contains characters that need expansion or
/// pattern matching at run time.
pub fn has_tokens(text: &str) -> bool {
    text.bytes().any(|byte| {
        matches!(
            byte,
            b'$' | b'`'
                | b'*'
                | b'?'
                | b'['
                | b']'
                | b'{'
                | b'}'
                | b'~'
                | b'^'
                | b'#'
                | b'='
                | b'<'
                | b'>'
                | b'('
                | b')'
                | b'|'
                | b'\''
                | b'"'
                | b'\\'
        )
    })
}

/// Encodes a string of at most three bytes inline.
///
/// Returns `None` for longer strings.
pub fn inline_reference(text: &str) -> Option<Wordcode> {
    let bytes = text.as_bytes();
    if bytes.len() > 3 {
        return None;
    }
    let tokens = has_tokens(text);
    if bytes.is_empty() {
        return Some(if tokens { EMPTY_TOKENS } else { EMPTY_PLAIN });
    }
    let mut word = INLINE_MARK | Wordcode::from(tokens);
    for (index, &byte) in bytes.iter().enumerate() {
        word |= Wordcode::from(byte) << (3 + 8 * index);
    }
    Some(word)
}

/// Decoded form of a string reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRef {
    /// Up to three bytes stored in the reference itself.
    Inline {
        /// Packed bytes, unused positions are zero.
        bytes: [u8; 3],
        /// Number of meaningful bytes.
        len: usize,
        /// Whether the text carries expansion tokens.
        tokens: bool,
    },
    /// Offset into the string table, relative to the enclosing function body.
    Table {
        /// Relative byte offset.
        offset: usize,
        /// Whether the text carries expansion tokens.
        tokens: bool,
    },
}

impl StringRef {
    /// Decodes a reference word.
    pub fn decode(word: Wordcode) -> Self {
        let tokens = word & TOKENS_MARK != 0;
        if word & INLINE_MARK == 0 {
            return Self::Table {
                offset: (word >> 2) as usize,
                tokens,
            };
        }
        if word & 4 != 0 {
            return Self::Inline {
                bytes: [0; 3],
                len: 0,
                tokens,
            };
        }
        let bytes = [(word >> 3) as u8, (word >> 11) as u8, (word >> 19) as u8];
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(3);
        Self::Inline { bytes, len, tokens }
    }

    /// Whether the referenced text carries expansion tokens.
    pub fn has_tokens(self) -> bool {
        match self {
            Self::Inline { tokens, .. } | Self::Table { tokens, .. } => tokens,
        }
    }
}

#[derive(Debug)]
struct InternNode {
    generation: u32,
    hash: u32,
    text: Box<str>,
    absolute: usize,
    reference: Wordcode,
    left: Option<u32>,
    right: Option<u32>,
}

/// Saved state restored when a function body ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionScope {
    outer_base: usize,
    body_start: usize,
}

impl FunctionScope {
    /// Offset of the body's first string relative to the enclosing range.
    pub fn relative_start(self) -> usize {
        self.body_start - self.outer_base
    }
}

/// Deduplicating table of long strings.
///
/// Nodes form a binary search tree ordered by generation, hash and bytes,
/// stored in an arena and linked by index. The first insertion of a key
/// wins; later lookups of the same key return its reference.
#[derive(Debug, Default)]
pub struct InternTable {
    nodes: Vec<InternNode>,
    root: Option<u32>,
    generation: u32,
    base: usize,
    used: usize,
}

impl InternTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all strings and resets generation and offsets.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.generation = 0;
        self.base = 0;
        self.used = 0;
    }

    /// Total bytes the string table will occupy, terminators included.
    pub fn byte_len(&self) -> usize {
        self.used
    }

    /// Number of distinct long strings stored.
    pub fn entries(&self) -> usize {
        self.nodes.len()
    }

    /// Current generation counter.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns the reference word for `text`, storing it when new.
    pub fn intern(&mut self, text: &str) -> Result<Wordcode, CompileError> {
        if let Some(word) = inline_reference(text) {
            return Ok(word);
        }

        let hash = xxh3_64(text.as_bytes()) as u32;
        let mut link: Option<(u32, bool)> = None;
        let mut cursor = self.root;
        while let Some(index) = cursor {
            let node = &self.nodes[index as usize];
            let order = node
                .generation
                .cmp(&self.generation)
                .then(node.hash.cmp(&hash))
                .then_with(|| node.text.as_bytes().cmp(text.as_bytes()));
            match order {
                std::cmp::Ordering::Equal => return Ok(node.reference),
                std::cmp::Ordering::Less => {
                    link = Some((index, true));
                    cursor = node.left;
                }
                std::cmp::Ordering::Greater => {
                    link = Some((index, false));
                    cursor = node.right;
                }
            }
        }

        let end = self.used + text.len() + 1;
        if end > MAX_TABLE_BYTES {
            return Err(CompileError::encoding_overflow(end));
        }
        let relative = (self.used - self.base) as Wordcode;
        let reference = (relative << 2) | Wordcode::from(has_tokens(text));
        let index = self.nodes.len() as u32;
        self.nodes.push(InternNode {
            generation: self.generation,
            hash,
            text: text.into(),
            absolute: self.used,
            reference,
            left: None,
            right: None,
        });
        match link {
            None => self.root = Some(index),
            Some((parent, true)) => self.nodes[parent as usize].left = Some(index),
            Some((parent, false)) => self.nodes[parent as usize].right = Some(index),
        }
        self.used = end;
        Ok(reference)
    }

    /// Starts a function body: new generation, offsets relative to here.
    pub fn enter_function(&mut self) -> FunctionScope {
        self.generation += 1;
        let scope = FunctionScope {
            outer_base: self.base,
            body_start: self.used,
        };
        self.base = self.used;
        scope
    }

    /// Ends a function body and returns the byte length of its strings.
    pub fn leave_function(&mut self, scope: FunctionScope) -> usize {
        self.generation += 1;
        self.base = scope.outer_base;
        self.used - scope.body_start
    }

    /// Copies every stored string, NUL-terminated, to its offset in `out`.
    ///
    /// `out` must hold at least [`InternTable::byte_len`] bytes.
    pub fn write_into(&self, out: &mut [u8]) {
        let mut pending: Vec<u32> = self.root.into_iter().collect();
        while let Some(index) = pending.pop() {
            let node = &self.nodes[index as usize];
            let end = node.absolute + node.text.len();
            if let Some(slot) = out.get_mut(node.absolute..end) {
                slot.copy_from_slice(node.text.as_bytes());
            }
            if let Some(terminator) = out.get_mut(end) {
                *terminator = 0;
            }
            pending.extend(node.left);
            pending.extend(node.right);
        }
    }
}
