//! Conditional expressions: `[[ ... ]]` and `test`/`[` argument lists.
//!
//! Both share one grammar. With a test source the argument count steers
//! the POSIX special cases, and separators are never skipped.

use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::lexer::{TokenKind, TokenSource};
use crate::wordcode::code::{self, RedirKind, cond};

/// Test-mode letters that make a leading `-X` a unary operator.
const TEST_UNARY_LETTERS: &str = "abcdefghknoprstuvwxzLONGS";

fn dash_name(text: &str) -> Option<&str> {
    text.strip_prefix('-')
}

fn binary_operator(name: &str) -> Option<u32> {
    cond::BINARY_OPERATORS
        .iter()
        .position(|op| *op == name)
        .map(|index| cond::NT + index as u32)
}

fn is_two_char_dash(text: &str) -> bool {
    text.len() == 2 && text.starts_with('-')
}

impl<S: TokenSource> Compiler<S> {
    /// dinbrack: `DINBRACK cond DOUTBRACK`
    pub(crate) fn dinbrack(&mut self) -> Result<(), CompileError> {
        self.state.in_cond = true;
        self.state.in_cmd_pos = false;
        self.advance()?;
        self.cond()?;
        if self.kind() != TokenKind::DoutBrack {
            return Err(self.unexpected_expecting(Some("]]")));
        }
        self.state.in_cond = false;
        self.state.in_cmd_pos = true;
        self.advance()
    }

    fn at_cond_separator(&self) -> bool {
        self.kind() == TokenKind::Seper && !self.source.is_test_source() && self.token.text != ";"
    }

    fn skip_cond_separators(&mut self) -> Result<(), CompileError> {
        while self.at_cond_separator() {
            self.advance()?;
        }
        Ok(())
    }

    /// Advances once, then past any separators.
    fn advance_cond(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        self.skip_cond_separators()
    }

    /// cond: `cond_1 { SEPER } [ DBAR { SEPER } cond ]`
    pub(crate) fn cond(&mut self) -> Result<(), CompileError> {
        self.logical(TokenKind::Dbar, cond::OR)
    }

    /// cond_1: `cond_2 { SEPER } [ DAMPER { SEPER } cond_1 ]`
    fn cond_1(&mut self) -> Result<(), CompileError> {
        self.logical(TokenKind::Damper, cond::AND)
    }

    fn logical(&mut self, operator: TokenKind, kind: u32) -> Result<(), CompileError> {
        let p = self.used();
        if operator == TokenKind::Dbar {
            self.cond_1()?;
        } else {
            self.cond_2()?;
        }
        self.skip_cond_separators()?;
        if self.kind() != operator {
            return Ok(());
        }
        self.advance_cond()?;
        self.insert(p, 1)?;
        if operator == TokenKind::Dbar {
            self.cond()?;
        } else {
            self.cond_1()?;
        }
        let skip = self.skip_from(p);
        self.set(p, code::cond_word(kind, skip));
        Ok(())
    }

    fn cond_2(&mut self) -> Result<(), CompileError> {
        self.descend()?;
        let result = self.cond_term();
        self.ascend();
        result
    }

    /// cond_2: `BANG cond_2`, `( cond )`, `s1 s2 s3`, `s1 s2` or
    /// `s1 ( < | > ) s3`.
    fn cond_term(&mut self) -> Result<(), CompileError> {
        let test = self.source.is_test_source();
        let testargs = if test {
            self.source.remaining_test_args() + 1
        } else {
            0
        };

        if test {
            if self.kind() == TokenKind::NullTok {
                return self.cond_double("-n", "");
            }
            if testargs == 1 {
                let s1 = std::mem::take(&mut self.token.text);
                self.advance()?;
                if !self.options.posix_builtins && s1 == "-t" {
                    return self.cond_double(&s1, "1");
                }
                return self.cond_double("-n", &s1);
            }
            if testargs > 2 {
                let binary = self.source.peek_test_arg().is_some_and(|op| {
                    matches!(op, "=" | "==" | "!=")
                        || dash_name(op).and_then(binary_operator).is_some()
                });
                if binary {
                    let s1 = std::mem::take(&mut self.token.text);
                    self.advance()?;
                    let s2 = std::mem::take(&mut self.token.text);
                    self.advance()?;
                    let s3 = std::mem::take(&mut self.token.text);
                    self.advance()?;
                    return self.cond_triple(&s1, &s2, &s3);
                }
            }
        } else {
            self.skip_cond_separators()?;
        }

        if self.kind() == TokenKind::Bang {
            // `test ! -a x` reads `!` as a string operand.
            let operand = testargs > 2
                && matches!(self.source.peek_test_arg(), Some("-a" | "-o"));
            if !operand {
                self.advance()?;
                self.emit(code::cond_word(cond::NOT, 0))?;
                return self.cond_2();
            }
        }

        if self.kind() == TokenKind::InPar {
            self.advance_cond()?;
            self.cond()?;
            self.skip_cond_separators()?;
            if self.kind() != TokenKind::OutPar {
                return Err(self.unexpected_expecting(Some(")")));
            }
            return self.advance();
        }

        let s1 = (test || self.kind() == TokenKind::String)
            .then(|| self.token.text.clone());
        let mut dble = s1.as_deref().is_some_and(|s| {
            is_two_char_dash(s)
                && (!test || s[1..].chars().all(|c| TEST_UNARY_LETTERS.contains(c)))
        });

        if self.kind() != TokenKind::String {
            // [[ STRING ]] re-interpretation of an operator-like token.
            return match s1 {
                Some(s1) if self.kind() != TokenKind::LexErr && (!dble || test) => {
                    self.advance_cond()?;
                    self.cond_double("-n", &s1)
                }
                _ => Err(self.unexpected()),
            };
        }
        let s1 = self.token.text.clone();

        self.advance()?;
        if testargs == 2 && self.kind() != TokenKind::String && s1.starts_with('-') {
            // `test -z` followed by an operator-like argument.
            self.token.kind = TokenKind::String;
        } else {
            self.skip_cond_separators()?;
        }

        if let TokenKind::Redir(kind @ (RedirKind::Read | RedirKind::Write)) = self.kind() {
            self.advance_cond()?;
            if self.kind() != TokenKind::String {
                return Err(self.unexpected());
            }
            let s3 = self.token.text.clone();
            self.advance_cond()?;
            let kind = if kind == RedirKind::Read {
                cond::STRLT
            } else {
                cond::STRGTR
            };
            self.emit(code::cond_word(kind, 0))?;
            self.emit_str(&s1)?;
            self.emit_str(&s3)?;
            return Ok(());
        }

        if self.kind() != TokenKind::String {
            if self.kind() == TokenKind::LexErr {
                return Err(self.unexpected());
            }
            return if !dble || test {
                self.cond_double("-n", &s1)
            } else {
                self.cond_multi(&s1, &[])
            };
        }

        let s2 = self.token.text.clone();
        if !test {
            dble = is_two_char_dash(&s2);
        }
        self.advance_cond()?;
        if self.kind() == TokenKind::String && !dble {
            let s3 = self.token.text.clone();
            self.advance_cond()?;
            if self.kind() == TokenKind::String {
                let mut rest = vec![s2, s3];
                while self.kind() == TokenKind::String {
                    rest.push(self.token.text.clone());
                    self.advance_cond()?;
                }
                return self.cond_multi(&s1, &rest);
            }
            return self.cond_triple(&s1, &s2, &s3);
        }
        self.cond_double(&s1, &s2)
    }

    fn condition_expected(&self, found: &str) -> CompileError {
        CompileError::condition_expected(self.token.line, found)
    }

    /// Unary test `a b`: a single-letter test or a module test.
    fn cond_double(&mut self, a: &str, b: &str) -> Result<(), CompileError> {
        let Some(name) = dash_name(a).filter(|name| !name.is_empty()) else {
            return Err(self.condition_expected(a));
        };
        match name.as_bytes() {
            [letter] if cond::UNARY_LETTERS.as_bytes().contains(letter) => {
                self.emit(code::cond_word(u32::from(*letter), 0))?;
            }
            _ => {
                self.emit(code::cond_word(cond::MOD, 1))?;
                self.emit_str(a)?;
            }
        }
        self.emit_str(b)?;
        Ok(())
    }

    /// Binary test `a b c`.
    fn cond_triple(&mut self, a: &str, b: &str, c: &str) -> Result<(), CompileError> {
        let string_test = match b {
            "=" => Some(cond::STREQ),
            "==" => Some(cond::STRDEQ),
            "!=" => Some(cond::STRNEQ),
            _ => None,
        };
        if let Some(kind) = string_test {
            self.emit(code::cond_word(kind, 0))?;
            self.emit_str(a)?;
            self.emit_str(c)?;
            self.builder.emit_pattern_slot()?;
        } else if b == "=~" {
            self.emit(code::cond_word(cond::REGEX, 0))?;
            self.emit_str(a)?;
            self.emit_str(c)?;
        } else if let Some(name) = dash_name(b) {
            match binary_operator(name) {
                Some(kind) => {
                    self.emit(code::cond_word(kind, 0))?;
                    self.emit_str(a)?;
                    self.emit_str(c)?;
                }
                None => {
                    self.emit(code::cond_word(cond::MODI, 0))?;
                    self.emit_str(b)?;
                    self.emit_str(a)?;
                    self.emit_str(c)?;
                }
            }
        } else if a.len() > 1 && a.starts_with('-') {
            self.emit(code::cond_word(cond::MOD, 2))?;
            self.emit_str(a)?;
            self.emit_str(b)?;
            self.emit_str(c)?;
        } else {
            return Err(self.condition_expected(b));
        }
        Ok(())
    }

    /// Module test with a variable number of arguments.
    fn cond_multi(&mut self, a: &str, rest: &[String]) -> Result<(), CompileError> {
        if a.len() < 2 || !a.starts_with('-') {
            return Err(self.condition_expected(a));
        }
        self.emit(code::cond_word(cond::MOD, rest.len() as u32))?;
        self.emit_str(a)?;
        for arg in rest {
            self.emit_str(arg)?;
        }
        Ok(())
    }
}
