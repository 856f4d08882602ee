//! Token source over a `test`/`[` argument vector.

use crate::lexer::token::{Token, TokenKind};
use crate::lexer::{LexState, TokenSource};

/// Feeds `test` arguments as condition tokens.
///
/// `-o`, `-a`, `!`, `(` and `)` become operators; everything else is a
/// word. The first read past the end yields [`TokenKind::NullTok`], any
/// further read a lexical error.
#[derive(Debug, Clone)]
pub struct TestArgs {
    args: Vec<String>,
    next: usize,
    exhausted: bool,
}

impl TestArgs {
    /// Creates a source over `args` (without the command name or a
    /// closing `]`).
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            next: 0,
            exhausted: false,
        }
    }
}

impl TokenSource for TestArgs {
    fn advance(&mut self, _state: &LexState) -> Token {
        let Some(arg) = self.args.get(self.next) else {
            let kind = if self.exhausted {
                TokenKind::LexErr
            } else {
                TokenKind::NullTok
            };
            self.exhausted = true;
            return Token::new(kind, "", 0);
        };
        self.next += 1;
        let kind = match arg.as_str() {
            "-o" => TokenKind::Dbar,
            "-a" => TokenKind::Damper,
            "!" => TokenKind::Bang,
            "(" => TokenKind::InPar,
            ")" => TokenKind::OutPar,
            _ => TokenKind::String,
        };
        Token::new(kind, arg.clone(), 0)
    }

    fn is_test_source(&self) -> bool {
        true
    }

    fn remaining_test_args(&self) -> usize {
        self.args.len().saturating_sub(self.next)
    }

    fn peek_test_arg(&self) -> Option<&str> {
        self.args.get(self.next).map(String::as_str)
    }
}
