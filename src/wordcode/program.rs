//! Compiled program images.
//!
//! A [`Program`] owns (or, when mapped from a cache file, aliases) its
//! instruction words and string table, and carries one lazily filled slot
//! per pattern emitted by the compiler.

use std::any::Any;
use std::borrow::Cow;
use std::cell::{Cell, OnceCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::cache::format::ByteOrder;
use crate::cache::segment::Segment;
use crate::wordcode::code::{self, END, Tag, Wordcode};

bitflags! {
    /// Ownership and state flags of a program.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProgramFlags: u32 {
        /// Persistent, individually reference counted.
        const REAL = 1;
        /// Transient, owned by an enclosing scope.
        const HEAP = 2;
        /// Aliases a mapped cache segment.
        const MAP = 4;
        /// Currently executing.
        const RUN = 8;
    }
}

/// Compiled form of a pattern, produced by the caller's matcher.
pub type CompiledPattern = Rc<dyn Any>;

enum Body {
    Owned {
        code: Box<[Wordcode]>,
        strings: Box<[u8]>,
    },
    Mapped {
        segment: Rc<Segment>,
        code_offset: usize,
        code_words: usize,
        strings_offset: usize,
        strings_len: usize,
        order: ByteOrder,
    },
}

/// An immutable compiled program.
pub struct Program {
    flags: Cell<ProgramFlags>,
    patterns: Box<[OnceCell<CompiledPattern>]>,
    body: Body,
}

impl Program {
    /// Creates a program that owns its code and strings.
    pub fn from_parts(
        code: Vec<Wordcode>,
        strings: Vec<u8>,
        pattern_count: usize,
        heap: bool,
    ) -> Rc<Self> {
        Rc::new(Self {
            flags: Cell::new(if heap {
                ProgramFlags::HEAP
            } else {
                ProgramFlags::REAL
            }),
            patterns: fresh_slots(pattern_count),
            body: Body::Owned {
                code: code.into_boxed_slice(),
                strings: strings.into_boxed_slice(),
            },
        })
    }

    /// Creates a program whose code and strings alias `segment`.
    ///
    /// Offsets are in bytes from the start of the mapping.
    pub(crate) fn mapped(
        segment: Rc<Segment>,
        code_offset: usize,
        code_words: usize,
        strings_offset: usize,
        strings_len: usize,
        pattern_count: usize,
        order: ByteOrder,
    ) -> Rc<Self> {
        Rc::new(Self {
            flags: Cell::new(ProgramFlags::MAP),
            patterns: fresh_slots(pattern_count),
            body: Body::Mapped {
                segment,
                code_offset,
                code_words,
                strings_offset,
                strings_len,
                order,
            },
        })
    }

    /// Returns a program consisting of a single END word.
    pub fn empty(heap: bool) -> Rc<Self> {
        Self::from_parts(vec![END], Vec::new(), 0, heap)
    }

    /// Returns the ownership and state flags.
    pub fn flags(&self) -> ProgramFlags {
        self.flags.get()
    }

    /// Marks the program as executing or idle.
    pub fn set_running(&self, running: bool) {
        let mut flags = self.flags.get();
        flags.set(ProgramFlags::RUN, running);
        self.flags.set(flags);
    }

    /// Reference count of a persistent or mapped program.
    ///
    /// Transient programs are not individually counted and report `None`.
    pub fn ref_count(this: &Rc<Self>) -> Option<usize> {
        if this.flags().contains(ProgramFlags::HEAP) {
            None
        } else {
            Some(Rc::strong_count(this))
        }
    }

    /// Number of pattern slots.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` when pattern `slot` has been compiled.
    pub fn pattern_is_compiled(&self, slot: usize) -> bool {
        self.patterns
            .get(slot)
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Returns the compiled pattern in `slot`, compiling it on first use.
    pub fn pattern_or_compile(
        &self,
        slot: usize,
        compile: impl FnOnce() -> CompiledPattern,
    ) -> Option<CompiledPattern> {
        self.patterns
            .get(slot)
            .map(|cell| Rc::clone(cell.get_or_init(compile)))
    }

    /// Number of instruction words, the final END included.
    pub fn len(&self) -> usize {
        match &self.body {
            Body::Owned { code, .. } => code.len(),
            Body::Mapped { code_words, .. } => *code_words,
        }
    }

    /// Returns `true` when the program contains no command.
    pub fn is_empty(&self) -> bool {
        self.len() == 0 || code::code(self.word(0)) == Tag::End as u32
    }

    /// Returns the word at `index`, or END past the end.
    pub fn word(&self, index: usize) -> Wordcode {
        match &self.body {
            Body::Owned { code, .. } => code.get(index).copied().unwrap_or(END),
            Body::Mapped {
                segment,
                code_offset,
                code_words,
                order,
                ..
            } => {
                if index >= *code_words {
                    return END;
                }
                let start = code_offset + index * 4;
                segment
                    .bytes()
                    .get(start..start + 4)
                    .map_or(END, |bytes| order.read_word(bytes))
            }
        }
    }

    /// Returns all instruction words.
    pub fn words(&self) -> Cow<'_, [Wordcode]> {
        match &self.body {
            Body::Owned { code, .. } => Cow::Borrowed(&code[..]),
            Body::Mapped { .. } => Cow::Owned((0..self.len()).map(|i| self.word(i)).collect()),
        }
    }

    /// Returns the string table bytes.
    pub fn strings(&self) -> &[u8] {
        match &self.body {
            Body::Owned { strings, .. } => &strings[..],
            Body::Mapped {
                segment,
                strings_offset,
                strings_len,
                ..
            } => segment
                .bytes()
                .get(*strings_offset..strings_offset + strings_len)
                .unwrap_or(&[]),
        }
    }

    /// Copies the program into fresh owned storage with new pattern slots.
    pub fn duplicate(&self, heap: bool) -> Rc<Self> {
        Self::from_parts(
            self.words().into_owned(),
            self.strings().to_vec(),
            self.pattern_count(),
            heap,
        )
    }

    /// Extracts the body of the function defined at `position` as a
    /// standalone persistent program.
    ///
    /// Returns `None` when `position` does not hold a FUNCDEF word or the
    /// recorded ranges fall outside this program.
    pub fn function_body(&self, position: usize) -> Option<Rc<Self>> {
        let head = self.word(position);
        if Tag::of(head) != Some(Tag::Funcdef) {
            return None;
        }
        let end = position + code::data(head) as usize;
        let names = self.word(position + 1) as usize;
        let header = position + names + 2;
        let strings_start = self.word(header) as usize;
        let strings_len = self.word(header + 1) as usize;
        let patterns = self.word(header + 2) as usize;
        let body_start = header + 4;
        if end >= self.len() || body_start > end {
            return None;
        }
        let code = (body_start..=end).map(|i| self.word(i)).collect();
        let strings = self
            .strings()
            .get(strings_start..strings_start + strings_len)?
            .to_vec();
        Some(Self::from_parts(code, strings, patterns, false))
    }

    /// Returns `true` when the program aliases a cache mapping.
    pub fn is_mapped(&self) -> bool {
        matches!(self.body, Body::Mapped { .. })
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("flags", &self.flags())
            .field("patterns", &self.pattern_count())
            .field("words", &self.len())
            .field("string_bytes", &self.strings().len())
            .finish()
    }
}

fn fresh_slots(count: usize) -> Box<[OnceCell<CompiledPattern>]> {
    (0..count).map(|_| OnceCell::new()).collect()
}
