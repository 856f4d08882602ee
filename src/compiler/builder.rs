//! Working state of one compilation unit and its finalisation.

use std::rc::Rc;

use crate::error::CompileError;
use crate::wordcode::buffer::InstructionBuffer;
use crate::wordcode::code::{END, Wordcode};
use crate::wordcode::program::Program;
use crate::wordcode::strings::{FunctionScope, InternTable};

/// Instruction buffer, string table and pattern counter of one unit.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    pub(crate) buffer: InstructionBuffer,
    pub(crate) strings: InternTable,
    pub(crate) patterns: u32,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards all state, starting a new unit.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.strings.reset();
        self.patterns = 0;
    }

    /// Number of words emitted so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` before the first word is emitted.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends a word and returns its position.
    pub fn emit(&mut self, word: Wordcode) -> Result<usize, CompileError> {
        self.buffer.append(word)
    }

    /// Interns `text` and appends its reference.
    pub fn emit_str(&mut self, text: &str) -> Result<usize, CompileError> {
        let word = self.strings.intern(text)?;
        self.buffer.append(word)
    }

    /// Appends the next pattern slot number.
    pub fn emit_pattern_slot(&mut self) -> Result<usize, CompileError> {
        let slot = self.patterns;
        self.patterns += 1;
        self.buffer.append(slot)
    }

    /// Returns the reference word for `text`.
    pub fn str_code(&mut self, text: &str) -> Result<Wordcode, CompileError> {
        self.strings.intern(text)
    }

    /// Starts a function body with its own generation and pattern numbering.
    ///
    /// Returns the saved outer state for [`ProgramBuilder::leave_function`].
    pub fn enter_function(&mut self) -> (FunctionScope, u32) {
        let scope = self.strings.enter_function();
        let outer_patterns = std::mem::replace(&mut self.patterns, 0);
        (scope, outer_patterns)
    }

    /// Ends a function body, returning its string length and pattern count.
    pub fn leave_function(&mut self, (scope, outer_patterns): (FunctionScope, u32)) -> (usize, u32) {
        let strings = self.strings.leave_function(scope);
        let patterns = std::mem::replace(&mut self.patterns, outer_patterns);
        (strings, patterns)
    }

    /// Appends END and turns the unit into a program, resetting the builder.
    pub fn finish(&mut self, heap: bool) -> Result<Rc<Program>, CompileError> {
        self.buffer.append(END)?;
        let code = self.buffer.take_words();
        let mut strings = vec![0u8; self.strings.byte_len()];
        self.strings.write_into(&mut strings);
        let program = Program::from_parts(code, strings, self.patterns as usize, heap);
        self.reset();
        Ok(program)
    }
}
