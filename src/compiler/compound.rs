//! Compound commands: loops, `case`, `if`, subshells and brace groups.

use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::lexer::{CasePattern, TokenKind, TokenSource};
use crate::wordcode::code::{self, CaseType, END, ForType, IfType, SelectType, WhileType};

/// Loop variable names: identifiers, or all-digit positional names.
fn is_identifier(text: &str) -> bool {
    let bytes = text.as_bytes();
    match bytes.first() {
        None => false,
        Some(first) if first.is_ascii_digit() => bytes.iter().all(u8::is_ascii_digit),
        Some(_) => bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_'),
    }
}

/// Unwraps a whole `(a | b)` case pattern read as one word, dropping
/// blanks around top-level `|`.
fn unwrap_pattern(text: &str) -> Option<String> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0usize;
    let mut out = String::with_capacity(inner.len());
    for ch in inner.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            _ => {}
        }
        if depth == 0 && ch == '|' {
            let trimmed = out.trim_end().len();
            out.truncate(trimmed);
            out.push('|');
            continue;
        }
        if ch.is_ascii_whitespace() && depth == 0 && out.ends_with('|') {
            continue;
        }
        out.push(ch);
    }
    (depth == 0 && !out.is_empty()).then_some(out)
}

enum LoopKind {
    For(ForType),
    Select(SelectType),
}

impl<S: TokenSource> Compiler<S> {
    /// Body of `for`, `while` and `repeat`: `do list done`, `{ list }`,
    /// `list end` or a single short-form command.
    fn loop_body(&mut self, cmplx: &mut bool, csh: bool) -> Result<(), CompileError> {
        match self.kind() {
            TokenKind::DoLoop => {
                self.advance()?;
                self.save_list(cmplx)?;
                if self.kind() != TokenKind::Done {
                    return Err(self.unexpected_expecting(Some("done")));
                }
            }
            TokenKind::InBrace => {
                self.advance()?;
                self.save_list(cmplx)?;
                if self.kind() != TokenKind::OutBrace {
                    return Err(self.unexpected_expecting(Some("}")));
                }
            }
            _ if csh || self.options.csh_junkie_loops => {
                self.save_list(cmplx)?;
                if self.kind() != TokenKind::ZEnd {
                    return Err(self.unexpected_expecting(Some("end")));
                }
            }
            _ if !self.options.short_loops => {
                return Err(self.unexpected_expecting(Some("do")));
            }
            _ => return self.save_list1(cmplx),
        }
        self.state.in_cmd_pos = false;
        self.advance()
    }

    /// for: `for (( init; cond; step ))`, or `for`/`foreach`/`select`
    /// names followed by `in words`, `( words )` or nothing.
    pub(crate) fn for_loop(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let csh = self.kind() == TokenKind::Foreach;
        let select = self.kind() == TokenKind::Select;
        let p = self.emit(0)?;

        self.state.in_cmd_pos = false;
        self.state.in_for = self.kind() == TokenKind::For;
        self.advance()?;

        let kind = if self.kind() == TokenKind::DinPar {
            self.advance()?;
            for close in [TokenKind::DinPar, TokenKind::DinPar, TokenKind::DoutPar] {
                if self.kind() != close {
                    return Err(self.unexpected());
                }
                self.emit_token_text()?;
                if close == TokenKind::DoutPar {
                    self.state.in_for = false;
                    self.state.in_cmd_pos = true;
                }
                self.advance()?;
            }
            LoopKind::For(ForType::Cond)
        } else {
            self.state.in_for = false;
            if self.kind() != TokenKind::String || !is_identifier(&self.token.text) {
                return Err(self.unexpected());
            }
            let count_at = if select { None } else { Some(self.emit(0)?) };
            let mut names = 0;
            self.state.in_cmd_pos = true;
            let no_aliases = self.state.no_aliases;
            self.state.no_aliases = true;
            loop {
                names += 1;
                self.emit_token_text()?;
                self.advance()?;
                if self.kind() != TokenKind::String || self.token.text == "in" || select {
                    break;
                }
                if !is_identifier(&self.token.text) {
                    return Err(self.unexpected());
                }
            }
            self.state.no_aliases = no_aliases;
            if let Some(at) = count_at {
                self.set(at, names);
            }

            let posix_in = self.token.newline;
            while self.kind() == TokenKind::Seper && self.token.newline {
                self.advance()?;
            }
            if self.at_word("in") {
                self.state.in_cmd_pos = false;
                self.advance()?;
                let at = self.emit(0)?;
                let words = self.wordlist()?;
                if self.kind() != TokenKind::Seper {
                    return Err(self.unexpected());
                }
                self.set(at, words);
                if select {
                    LoopKind::Select(SelectType::List)
                } else {
                    LoopKind::For(ForType::List)
                }
            } else if !posix_in && self.kind() == TokenKind::InPar {
                self.state.in_cmd_pos = false;
                self.advance()?;
                let at = self.emit(0)?;
                let words = self.nl_wordlist()?;
                if self.kind() != TokenKind::OutPar {
                    return Err(self.unexpected_expecting(Some(")")));
                }
                self.set(at, words);
                self.state.in_cmd_pos = true;
                self.advance()?;
                if select {
                    LoopKind::Select(SelectType::List)
                } else {
                    LoopKind::For(ForType::List)
                }
            } else if select {
                LoopKind::Select(SelectType::PParam)
            } else {
                LoopKind::For(ForType::PParam)
            }
        };

        self.state.in_cmd_pos = true;
        self.skip_separators()?;
        self.loop_body(cmplx, csh)?;

        let skip = self.skip_from(p);
        let word = match kind {
            LoopKind::For(kind) => code::for_loop(kind, skip),
            LoopKind::Select(kind) => code::select(kind, skip),
        };
        self.set(p, word);
        Ok(())
    }

    /// case: `case word in { [(] pattern { | pattern } ) list terminator } esac`
    pub(crate) fn case(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let p = self.emit(0)?;

        self.state.in_cmd_pos = false;
        self.advance()?;
        if self.kind() != TokenKind::String {
            return Err(self.unexpected());
        }
        self.emit_token_text()?;

        self.state.in_cmd_pos = true;
        let no_aliases = self.state.no_aliases;
        self.state.no_aliases = true;
        self.advance()?;
        self.skip_separators()?;
        if !(self.at_word("in") || self.kind() == TokenKind::InBrace) {
            return Err(self.unexpected_expecting(Some("in")));
        }
        let braces = self.kind() == TokenKind::InBrace;
        self.state.in_case_pat = CasePattern::Yes;
        self.state.in_cmd_pos = false;
        self.state.no_aliases = no_aliases;
        self.advance()?;

        loop {
            self.skip_separators()?;
            if self.kind() == TokenKind::OutBrace {
                break;
            }
            if self.kind() == TokenKind::InPar {
                self.advance()?;
            }
            let (mut pattern, pending) = if self.kind() == TokenKind::Bar {
                (String::new(), true)
            } else {
                if self.kind() != TokenKind::String {
                    return Err(self.unexpected());
                }
                if self.token.text == "esac" {
                    break;
                }
                (self.token.text.clone(), false)
            };

            let mut kind = CaseType::Or;
            let pp = self.emit(0)?;
            let palts = self.emit(0)?;
            let mut alternatives = 0u32;

            // The token after a pattern may already start the arm's
            // command when the whole pattern was one parenthesised word.
            self.state.in_case_pat = CasePattern::Maybe;
            self.state.in_cmd_pos = true;
            if !pending {
                self.advance()?;
            }
            loop {
                match self.kind() {
                    TokenKind::OutPar => {
                        self.emit_str(&pattern)?;
                        self.builder.emit_pattern_slot()?;
                        alternatives += 1;
                        self.state.in_case_pat = CasePattern::No;
                        self.state.in_cmd_pos = true;
                        self.advance()?;
                        break;
                    }
                    TokenKind::Bar => {
                        self.emit_str(&pattern)?;
                        self.builder.emit_pattern_slot()?;
                        alternatives += 1;
                        self.state.in_case_pat = CasePattern::Yes;
                        self.state.in_cmd_pos = false;
                    }
                    _ => {
                        if alternatives == 0 && pattern.starts_with('(') {
                            let Some(inner) = unwrap_pattern(&pattern) else {
                                return Err(self.unexpected());
                            };
                            self.emit_str(&inner)?;
                            self.builder.emit_pattern_slot()?;
                            alternatives += 1;
                            break;
                        }
                        return Err(self.unexpected_expecting(Some(")")));
                    }
                }

                self.advance()?;
                match self.kind() {
                    TokenKind::String => {
                        pattern = self.token.text.clone();
                        self.advance()?;
                    }
                    TokenKind::OutPar | TokenKind::Bar => pattern.clear(),
                    _ => return Err(self.unexpected()),
                }
            }

            self.state.in_case_pat = CasePattern::No;
            self.save_list(cmplx)?;
            match self.kind() {
                TokenKind::SemiAmp => kind = CaseType::And,
                TokenKind::SemiBar => kind = CaseType::TestAnd,
                _ => {}
            }
            let skip = self.skip_from(pp);
            self.set(pp, code::case(kind, skip));
            self.set(palts, alternatives);

            if (self.kind() == TokenKind::Esac && !braces)
                || (self.kind() == TokenKind::OutBrace && braces)
            {
                break;
            }
            if !matches!(
                self.kind(),
                TokenKind::Dsemi | TokenKind::SemiAmp | TokenKind::SemiBar
            ) {
                return Err(self.unexpected_expecting(Some(if braces { "}" } else { "esac" })));
            }
            self.state.in_case_pat = CasePattern::Yes;
            self.state.in_cmd_pos = false;
            self.advance()?;
        }
        self.state.in_cmd_pos = true;
        self.state.in_case_pat = CasePattern::No;
        self.advance()?;

        let skip = self.skip_from(p);
        self.set(p, code::case(CaseType::Head, skip));
        Ok(())
    }

    /// if: `if list then list { elif list then list } [ else list ] fi`,
    /// with `{ ... }` or short-form bodies.
    pub(crate) fn if_chain(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let p = self.emit(0)?;
        let mut use_brace = false;
        let mut xtok;

        loop {
            xtok = self.kind();
            if xtok == TokenKind::Fi {
                self.state.in_cmd_pos = false;
                self.advance()?;
                break;
            }
            self.advance()?;
            if xtok == TokenKind::Else {
                break;
            }
            self.skip_separators()?;
            if !matches!(xtok, TokenKind::If | TokenKind::Elif) {
                return Err(self.unexpected_expecting(Some("fi")));
            }
            let pp = self.emit(0)?;
            let kind = if xtok == TokenKind::If {
                IfType::If
            } else {
                IfType::Elif
            };
            self.save_list(cmplx)?;
            self.state.in_cmd_pos = true;
            if self.kind() == TokenKind::EndInput {
                return Err(self.unexpected_expecting(Some("then")));
            }
            self.skip_separators()?;
            xtok = TokenKind::Fi;

            match self.kind() {
                TokenKind::Then => {
                    use_brace = false;
                    self.advance()?;
                    self.save_list(cmplx)?;
                    let skip = self.skip_from(pp);
                    self.set(pp, code::if_branch(kind, skip));
                    self.state.in_cmd_pos = true;
                }
                TokenKind::InBrace => {
                    use_brace = true;
                    self.advance()?;
                    self.save_list(cmplx)?;
                    if self.kind() != TokenKind::OutBrace {
                        return Err(self.unexpected_expecting(Some("}")));
                    }
                    let skip = self.skip_from(pp);
                    self.set(pp, code::if_branch(kind, skip));
                    // `else` may follow the brace directly.
                    self.advance()?;
                    self.state.in_cmd_pos = true;
                    if self.kind() == TokenKind::Seper {
                        break;
                    }
                }
                _ if !self.options.short_loops => {
                    return Err(self.unexpected_expecting(Some("then")));
                }
                _ => {
                    self.save_list1(cmplx)?;
                    let skip = self.skip_from(pp);
                    self.set(pp, code::if_branch(kind, skip));
                    self.state.in_cmd_pos = true;
                    break;
                }
            }
        }

        if xtok == TokenKind::Else || self.kind() == TokenKind::Else {
            let pp = self.emit(0)?;
            self.skip_separators()?;
            if self.kind() == TokenKind::InBrace && use_brace {
                self.advance()?;
                self.save_list(cmplx)?;
                if self.kind() != TokenKind::OutBrace {
                    return Err(self.unexpected_expecting(Some("}")));
                }
            } else {
                self.save_list(cmplx)?;
                if self.kind() != TokenKind::Fi {
                    return Err(self.unexpected_expecting(Some("fi")));
                }
            }
            self.state.in_cmd_pos = false;
            let skip = self.skip_from(pp);
            self.set(pp, code::if_branch(IfType::Else, skip));
            self.advance()?;
        }
        let skip = self.skip_from(p);
        self.set(p, code::if_branch(IfType::Head, skip));
        Ok(())
    }

    /// while: `( while | until ) list body`
    pub(crate) fn while_loop(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let kind = if self.kind() == TokenKind::Until {
            WhileType::Until
        } else {
            WhileType::While
        };
        let p = self.emit(0)?;
        self.advance()?;
        self.save_list(cmplx)?;
        self.state.in_cmd_pos = true;
        self.skip_separators()?;
        self.loop_body(cmplx, false)?;
        let skip = self.skip_from(p);
        self.set(p, code::while_loop(kind, skip));
        Ok(())
    }

    /// repeat: `repeat word body`
    pub(crate) fn repeat(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let p = self.emit(0)?;
        self.state.in_cmd_pos = false;
        self.advance()?;
        if self.kind() != TokenKind::String {
            return Err(self.unexpected());
        }
        self.emit_token_text()?;
        self.state.in_cmd_pos = true;
        self.advance()?;
        self.skip_separators()?;
        self.loop_body(cmplx, false)?;
        let skip = self.skip_from(p);
        self.set(p, code::repeat(skip));
        Ok(())
    }

    /// subsh: `( list )` or `{ list } [ always { list } ]`
    pub(crate) fn subshell(&mut self, cmplx: &mut bool, zsh_construct: bool) -> Result<(), CompileError> {
        let open = self.kind();
        let p = self.emit(0)?;
        // Holds the TRY word when an `always` block follows.
        let pp = self.emit(0)?;
        self.advance()?;
        self.list(cmplx)?;
        self.emit(END)?;
        let (close, close_text) = if open == TokenKind::InPar {
            (TokenKind::OutPar, ")")
        } else {
            (TokenKind::OutBrace, "}")
        };
        if self.kind() != close {
            return Err(self.unexpected_expecting(Some(close_text)));
        }
        self.state.in_cmd_pos = !zsh_construct;
        self.advance()?;

        if open == TokenKind::InBrace && self.at_word("always") {
            let skip = self.skip_from(pp);
            self.set(pp, code::try_block(skip));
            self.state.in_cmd_pos = true;
            loop {
                self.advance()?;
                if self.kind() != TokenKind::Seper {
                    break;
                }
            }
            if self.kind() != TokenKind::InBrace {
                return Err(self.unexpected_expecting(Some("{")));
            }
            self.advance()?;
            self.save_list(cmplx)?;
            self.skip_separators()?;
            self.state.in_cmd_pos = true;
            if self.kind() != TokenKind::OutBrace {
                return Err(self.unexpected_expecting(Some("}")));
            }
            self.advance()?;
            let skip = self.skip_from(p);
            self.set(p, code::try_block(skip));
        } else {
            let skip = self.skip_from(p);
            let word = if open == TokenKind::InPar {
                code::subsh(skip)
            } else {
                code::cursh(skip)
            };
            self.set(p, word);
        }
        Ok(())
    }
}
