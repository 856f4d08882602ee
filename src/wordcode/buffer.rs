//! Growable instruction buffer with a here-document fixup side table.

use crate::error::CompileError;
use crate::wordcode::code::{MAX_PROGRAM_WORDS, Wordcode};

const INITIAL_CAPACITY: usize = 256;
const DOUBLING_LIMIT: usize = 32768;
const LINEAR_STEP: usize = 1024;

/// Instruction words under construction.
///
/// Positions are plain indices. Pending fixups (here-document redirections
/// whose body has not been read yet) are stored beside the words and move
/// with every insertion or deletion in front of them.
#[derive(Debug, Default)]
pub struct InstructionBuffer {
    words: Vec<Wordcode>,
    fixups: Vec<usize>,
}

impl InstructionBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of words written.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` when no word has been written.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the written words.
    pub fn words(&self) -> &[Wordcode] {
        &self.words
    }

    /// Returns the word at `position`, or `0` past the end.
    pub fn get(&self, position: usize) -> Wordcode {
        self.words.get(position).copied().unwrap_or(0)
    }

    /// Overwrites the word at `position`.
    pub fn set(&mut self, position: usize, word: Wordcode) {
        if let Some(slot) = self.words.get_mut(position) {
            *slot = word;
        }
    }

    /// Appends `word` and returns its position.
    pub fn append(&mut self, word: Wordcode) -> Result<usize, CompileError> {
        self.reserve(1)?;
        self.words.push(word);
        Ok(self.words.len() - 1)
    }

    /// Opens `count` zeroed words at `position`, shifting the tail right.
    pub fn insert(&mut self, position: usize, count: usize) -> Result<(), CompileError> {
        let position = position.min(self.words.len());
        self.reserve(count)?;
        self.words
            .splice(position..position, std::iter::repeat_n(0, count));
        for fixup in &mut self.fixups {
            if *fixup >= position {
                *fixup += count;
            }
        }
        Ok(())
    }

    /// Removes the word at `position`, shifting the tail left.
    pub fn delete(&mut self, position: usize) {
        if position >= self.words.len() {
            return;
        }
        self.words.remove(position);
        for fixup in &mut self.fixups {
            if *fixup > position {
                *fixup -= 1;
            }
        }
    }

    /// Discards everything from `len` on, including fixups pointing there.
    pub fn truncate(&mut self, len: usize) {
        self.words.truncate(len);
        self.fixups.retain(|&position| position < len);
    }

    /// Clears words and fixups, keeping the allocation.
    pub fn clear(&mut self) {
        self.words.clear();
        self.fixups.clear();
    }

    /// Records a pending here-document redirection at `position`.
    pub fn register_fixup(&mut self, position: usize) {
        self.fixups.push(position);
    }

    /// Pops the oldest pending fixup, returning its current position.
    pub fn take_fixup(&mut self) -> Option<usize> {
        if self.fixups.is_empty() {
            None
        } else {
            Some(self.fixups.remove(0))
        }
    }

    /// Returns the number of unresolved fixups.
    pub fn pending_fixups(&self) -> usize {
        self.fixups.len()
    }

    /// Takes the written words, leaving the buffer empty.
    pub fn take_words(&mut self) -> Vec<Wordcode> {
        self.fixups.clear();
        std::mem::take(&mut self.words)
    }

    fn reserve(&mut self, additional: usize) -> Result<(), CompileError> {
        let needed = self.words.len().saturating_add(additional);
        if needed > MAX_PROGRAM_WORDS {
            return Err(CompileError::encoding_overflow(needed));
        }
        if needed <= self.words.capacity() {
            return Ok(());
        }
        let capacity = self.words.capacity();
        let step = if capacity == 0 {
            INITIAL_CAPACITY
        } else if capacity < DOUBLING_LIMIT {
            capacity
        } else {
            LINEAR_STEP
        };
        let grow = step.max(needed - capacity);
        self.words
            .try_reserve_exact(capacity + grow - self.words.len())
            .map_err(|_| CompileError::allocation(capacity + grow))
    }
}
