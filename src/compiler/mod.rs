//! Grammar compiler: shell tokens to wordcode programs.
//!
//! One [`Compiler`] drives a [`TokenSource`] and emits words into a
//! [`ProgramBuilder`]. Each entry point is one compilation unit: all
//! buffer and table state is reset when it starts, and a failed unit
//! leaves no program behind.

pub mod builder;

mod command;
mod compound;
mod cond;
mod list;

use std::rc::Rc;

use crate::error::CompileError;
use crate::lexer::{HereDocument, LexState, Lexer, TestArgs, Token, TokenKind, TokenSource};
use crate::wordcode::code::{self, RedirKind, Tag, Wordcode};
use crate::wordcode::program::Program;
use crate::wordcode::reader::ProgramCursor;

pub use builder::ProgramBuilder;

/// Grammar options consulted while compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    /// Loop and `if` bodies may be a single command without `do`/`then`.
    pub short_loops: bool,
    /// `while`, `for` and `repeat` bodies may end in `end`.
    pub csh_junkie_loops: bool,
    /// `a b () { ... }` defines several functions at once.
    pub multi_func_def: bool,
    /// `{var}>file` is not a descriptor-variable redirection.
    pub ignore_braces: bool,
    /// `test -t` is not rewritten to `test -t 1`.
    pub posix_builtins: bool,
    /// Maximum nesting depth of commands and conditions.
    pub max_nesting: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            short_loops: true,
            csh_junkie_loops: false,
            multi_func_def: true,
            ignore_braces: false,
            posix_builtins: false,
            max_nesting: 256,
        }
    }
}

/// Compiler over one token source.
///
/// The source is kept across calls, so [`Compiler::compile_event`] can be
/// called repeatedly to compile an input one command line at a time.
pub struct Compiler<S> {
    source: S,
    options: CompileOptions,
    token: Token,
    state: LexState,
    redir_cmd_pos: bool,
    builder: ProgramBuilder,
    line_base: u32,
    depth: usize,
    in_time: bool,
}

impl<S: TokenSource> Compiler<S> {
    /// Creates a compiler reading from `source`.
    pub fn new(source: S, options: CompileOptions) -> Self {
        Self {
            source,
            options,
            token: Token::new(TokenKind::EndInput, "", 0),
            state: LexState::default(),
            redir_cmd_pos: false,
            builder: ProgramBuilder::new(),
            line_base: 0,
            depth: 0,
            in_time: false,
        }
    }

    /// Returns the options in effect.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Returns `true` once the source has reported end of input.
    pub fn at_end(&self) -> bool {
        self.token.kind == TokenKind::EndInput
    }

    /// Gives back the token source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Compiles one event: the commands up to the end of the current line.
    ///
    /// Returns `Ok(None)` for an empty line or at end of input. After an
    /// error the rest of the line is skipped, so the next call starts on
    /// the following line.
    pub fn compile_event(&mut self, end: TokenKind) -> Result<Option<Rc<Program>>, CompileError> {
        self.begin_unit();
        let result = self.advance().and_then(|()| self.event(end));
        match result {
            Ok(true) => self.builder.finish(true).map(Some),
            Ok(false) => {
                self.builder.reset();
                Ok(None)
            }
            Err(error) => {
                self.abandon_unit();
                self.skip_to_line_end();
                Err(error)
            }
        }
    }

    /// Compiles everything up to end of input as one program.
    pub fn compile_list(&mut self) -> Result<Rc<Program>, CompileError> {
        self.begin_unit();
        let result = self.advance().and_then(|()| {
            let mut cmplx = false;
            self.list(&mut cmplx)?;
            if self.token.kind != TokenKind::EndInput {
                return Err(self.unexpected());
            }
            Ok(())
        });
        match result {
            Ok(()) => self.builder.finish(true),
            Err(error) => {
                self.abandon_unit();
                Err(error)
            }
        }
    }

    fn begin_unit(&mut self) {
        self.builder.reset();
        self.state = LexState::default();
        self.redir_cmd_pos = false;
        self.line_base = 0;
        self.depth = 0;
        self.in_time = false;
        self.token = Token::new(TokenKind::EndInput, "", 0);
    }

    fn abandon_unit(&mut self) {
        self.builder.buffer.truncate(0);
        self.builder.reset();
    }

    fn skip_to_line_end(&mut self) {
        while !(self.token.kind == TokenKind::EndInput
            || (self.token.kind == TokenKind::Seper && self.token.newline))
        {
            self.token = self.source.advance(&self.state);
            self.source.take_here_documents();
        }
    }

    // ---------------------------------------------------------------------
    // Token handling
    // ---------------------------------------------------------------------

    /// Reads the next token, resolves here-documents it completed and
    /// updates command-position tracking.
    pub(crate) fn advance(&mut self) -> Result<(), CompileError> {
        let token = self.source.advance(&self.state);
        for document in self.source.take_here_documents() {
            self.resolve_here_document(document)?;
        }
        if token.kind == TokenKind::LexErr {
            return Err(CompileError::lexical(token.line, token.text));
        }
        self.track_context(token.kind);
        self.token = token;
        Ok(())
    }

    fn track_context(&mut self, kind: TokenKind) {
        use TokenKind::*;
        match kind {
            Seper | Dsemi | SemiAmp | SemiBar | Amper | AmperBang | InPar | InBrace | Dbar
            | Damper | Bar | BarAmp | InOutPar | DoLoop | Then | Elif | Else | DoutBrack => {
                self.state.in_cmd_pos = true;
            }
            String | Typeset | EnvArray | OutPar | Case | DinBrack => {
                self.state.in_cmd_pos = false;
            }
            _ => {}
        }
        if kind != DinPar {
            self.state.in_for = kind == For;
        }
        if kind.is_redirection() || matches!(kind, For | Foreach | Select) {
            self.state.in_redir = true;
            self.redir_cmd_pos = self.state.in_cmd_pos;
            self.state.in_cmd_pos = false;
        } else if self.state.in_redir {
            self.state.in_cmd_pos = self.redir_cmd_pos;
            self.state.in_redir = false;
        }
    }

    fn resolve_here_document(&mut self, document: HereDocument) -> Result<(), CompileError> {
        let Some(position) = self.builder.buffer.take_fixup() else {
            return Ok(());
        };
        let word = self.builder.buffer.get(position);
        let varid = if code::redir_has_varid(word) {
            code::REDIR_VARID_MASK
        } else {
            0
        };
        self.builder.buffer.set(
            position,
            code::redir(
                RedirKind::HereString,
                code::REDIR_FROM_HEREDOC_MASK | varid,
            ),
        );
        let body = self.builder.str_code(&document.body)?;
        let raw = self.builder.str_code(&document.raw_terminator)?;
        let munged = self.builder.str_code(&document.munged_terminator)?;
        self.builder.buffer.set(position + 2, body);
        self.builder.buffer.set(position + 3, raw);
        self.builder.buffer.set(position + 4, munged);
        Ok(())
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.token.kind
    }

    /// Returns `true` when the current token is the plain word `text`.
    pub(crate) fn at_word(&self, text: &str) -> bool {
        self.token.kind == TokenKind::String && self.token.text == text
    }

    pub(crate) fn skip_separators(&mut self) -> Result<(), CompileError> {
        while self.token.kind == TokenKind::Seper {
            self.advance()?;
        }
        Ok(())
    }

    /// Line of the current token, relative to the enclosing function.
    pub(crate) fn line(&self) -> u32 {
        self.token.line.saturating_sub(self.line_base)
    }

    pub(crate) fn unexpected(&self) -> CompileError {
        self.unexpected_expecting(None)
    }

    pub(crate) fn unexpected_expecting(&self, expected: Option<&'static str>) -> CompileError {
        if self.token.kind == TokenKind::EndInput {
            CompileError::end_of_input(self.token.line, expected)
        } else {
            CompileError::unexpected(self.token.line, self.token.display_text(), expected)
        }
    }

    pub(crate) fn descend(&mut self) -> Result<(), CompileError> {
        if self.depth >= self.options.max_nesting {
            return Err(CompileError::nesting_too_deep(
                self.token.line,
                self.options.max_nesting,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ---------------------------------------------------------------------
    // Emission helpers
    // ---------------------------------------------------------------------

    pub(crate) fn used(&self) -> usize {
        self.builder.len()
    }

    pub(crate) fn emit(&mut self, word: Wordcode) -> Result<usize, CompileError> {
        self.builder.emit(word)
    }

    pub(crate) fn emit_str(&mut self, text: &str) -> Result<usize, CompileError> {
        self.builder.emit_str(text)
    }

    /// Emits the current token's text.
    pub(crate) fn emit_token_text(&mut self) -> Result<usize, CompileError> {
        let word = self.builder.str_code(&self.token.text)?;
        self.builder.emit(word)
    }

    pub(crate) fn get(&self, position: usize) -> Wordcode {
        self.builder.buffer.get(position)
    }

    pub(crate) fn set(&mut self, position: usize, word: Wordcode) {
        self.builder.buffer.set(position, word);
    }

    pub(crate) fn insert(&mut self, position: usize, count: usize) -> Result<(), CompileError> {
        self.builder.buffer.insert(position, count)
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.builder.buffer.truncate(len);
    }

    /// Words between `position` and the current end, excluding both.
    pub(crate) fn skip_from(&self, position: usize) -> u32 {
        (self.used() - 1 - position) as u32
    }
}

// -------------------------------------------------------------------------
// Convenience entry points
// -------------------------------------------------------------------------

/// Compiles shell text with the reference lexer.
pub fn compile_string(text: &str, options: CompileOptions) -> Result<Rc<Program>, CompileError> {
    Compiler::new(Lexer::new(text), options).compile_list()
}

/// Compiles a `test`/`[` argument vector into a condition program.
///
/// `args` excludes the command name and any closing `]`. An empty vector
/// compiles to the always-false `-n ""`.
pub fn compile_test<I, T>(args: I, options: CompileOptions) -> Result<Rc<Program>, CompileError>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut compiler = Compiler::new(TestArgs::new(args), options);
    compiler.advance()?;
    compiler.cond()?;
    if compiler.token.kind != TokenKind::NullTok {
        return Err(CompileError::unexpected(
            0,
            compiler.token.display_text(),
            Some("end of arguments"),
        ));
    }
    compiler.builder.finish(true)
}

/// Copies the run of redirections at the cursor into a new persistent
/// program, advancing the cursor past them.
///
/// Returns `None` when the cursor is not at a redirection.
pub fn copy_redirections(cursor: &mut ProgramCursor<'_>) -> Result<Option<Rc<Program>>, CompileError> {
    if Tag::of(cursor.peek()) != Some(Tag::Redir) {
        return Ok(None);
    }
    let mut builder = ProgramBuilder::new();
    while Tag::of(cursor.peek()) == Some(Tag::Redir) {
        let word = cursor.next_word();
        builder.emit(word)?;
        builder.emit(cursor.next_word())?;
        let strings = code::redir_words(word) - 2;
        for _ in 0..strings {
            let text = cursor.read_string();
            builder.emit_str(&text)?;
        }
    }
    builder.finish(false).map(Some)
}
