//! Token sources for the compiler.
//!
//! The compiler consumes tokens through [`TokenSource`] and steers the
//! source with [`LexState`] (command position, condition mode, case
//! patterns, and so on). [`Lexer`] is the reference implementation for
//! shell text; [`TestArgs`] feeds a `test`/`[` argument vector.

pub mod token;

mod alias;
mod cursor;
mod heredoc;
mod operator;
mod scanner;
mod test_args;

pub use alias::AliasTable;
pub use heredoc::HereDocument;
pub use scanner::Lexer;
pub(crate) use scanner::assignment_split;
pub use test_args::TestArgs;
pub use token::{Token, TokenKind, reserved_word};

/// Case-pattern reading mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CasePattern {
    /// Not reading a pattern.
    #[default]
    No,
    /// Reading a pattern word: `(`, `|` and `)` delimit alternatives.
    Yes,
    /// After a pattern word: either `|`/`)` or the start of a command.
    Maybe,
}

/// Flags the compiler toggles to steer tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexState {
    /// The next word is a command name: reserved words and assignments
    /// are recognised.
    pub in_cmd_pos: bool,
    /// Inside `[[ ... ]]`.
    pub in_cond: bool,
    /// Reading `case` patterns.
    pub in_case_pat: CasePattern,
    /// Right after `for`: `((` opens an arithmetic loop head.
    pub in_for: bool,
    /// Reading a redirection target.
    pub in_redir: bool,
    /// After a declaration builtin: assignment words are recognised.
    pub in_typeset: bool,
    /// Alias expansion is suppressed.
    pub no_aliases: bool,
}

impl Default for LexState {
    fn default() -> Self {
        Self {
            in_cmd_pos: true,
            in_cond: false,
            in_case_pat: CasePattern::No,
            in_for: false,
            in_redir: false,
            in_typeset: false,
            no_aliases: false,
        }
    }
}

impl LexState {
    /// Clears every per-command flag, as after a complete command.
    pub fn reset_command(&mut self) {
        self.in_cmd_pos = true;
        self.in_case_pat = CasePattern::No;
        self.in_cond = false;
        self.in_typeset = false;
    }
}

/// Producer of tokens for the compiler.
pub trait TokenSource {
    /// Reads the next token under the given steering flags.
    fn advance(&mut self, state: &LexState) -> Token;

    /// Returns here-document bodies read since the last call, in the order
    /// their operators appeared.
    fn take_here_documents(&mut self) -> Vec<HereDocument> {
        Vec::new()
    }

    /// Returns `true` when this source feeds `test` arguments.
    fn is_test_source(&self) -> bool {
        false
    }

    /// Number of test arguments not yet consumed.
    fn remaining_test_args(&self) -> usize {
        0
    }

    /// Returns the next unconsumed test argument.
    fn peek_test_arg(&self) -> Option<&str> {
        None
    }
}
