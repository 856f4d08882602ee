//! Commands: dispatch, simple commands, redirections and functions.

use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::lexer::{CasePattern, TokenKind, TokenSource, assignment_split};
use crate::wordcode::code::{
    self, AssignMode, AssignType, END, ListType, PipeType, RedirKind, SublistFlags, SublistType,
    TimedType,
};

/// Splits an assignment word into name, value and `+=` flag.
fn split_assignment(text: &str) -> (&str, &str, bool) {
    match assignment_split(text) {
        Some(eq) => {
            let name = &text[..eq];
            let value = &text[eq + 1..];
            match name.strip_suffix('+') {
                Some(name) => (name, value, true),
                None => (name, value, false),
            }
        }
        None => (text, "", false),
    }
}

/// Process substitutions need a job, so they make a command complex.
fn has_process_substitution(value: &str) -> bool {
    ["<(", ">(", "=("].iter().any(|open| value.contains(open))
}

/// Returns the name inside a `{name}` word.
fn brace_identifier(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('{')?.strip_suffix('}')?;
    (!inner.is_empty() && inner.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
        .then_some(inner)
}

impl<S: TokenSource> Compiler<S> {
    /// cmd: `{ redir } ( compound | simple ) { redir }`
    ///
    /// `zsh_construct` leaves the token after a subshell out of command
    /// position, for anonymous function arguments.
    pub(crate) fn cmd(&mut self, cmplx: &mut bool, zsh_construct: bool) -> Result<bool, CompileError> {
        self.descend()?;
        let result = self.cmd_inner(cmplx, zsh_construct);
        self.ascend();
        result
    }

    fn cmd_inner(&mut self, cmplx: &mut bool, zsh_construct: bool) -> Result<bool, CompileError> {
        let mut r = self.used();
        let mut nr = 0;

        if self.kind().is_redirection() {
            *cmplx = true;
            while self.kind().is_redirection() {
                nr += self.redirection(&mut r, None)?;
            }
        }
        match self.kind() {
            TokenKind::For | TokenKind::Foreach => self.for_loop(cmplx)?,
            TokenKind::Select => {
                *cmplx = true;
                self.for_loop(cmplx)?;
            }
            TokenKind::Case => self.case(cmplx)?,
            TokenKind::If => self.if_chain(cmplx)?,
            TokenKind::While | TokenKind::Until => self.while_loop(cmplx)?,
            TokenKind::Repeat => self.repeat(cmplx)?,
            TokenKind::InPar => {
                *cmplx = true;
                self.subshell(cmplx, zsh_construct)?;
            }
            TokenKind::InBrace => self.subshell(cmplx, zsh_construct)?,
            TokenKind::Func => self.funcdef(cmplx)?,
            TokenKind::DinBrack => self.dinbrack()?,
            TokenKind::DinPar => {
                self.emit(code::arith())?;
                self.emit_token_text()?;
                self.advance()?;
            }
            TokenKind::Time if !self.in_time => {
                *cmplx = true;
                self.in_time = true;
                let result = self.time();
                self.in_time = false;
                result?;
            }
            kind => {
                // A nested `time` is an ordinary command word.
                if kind == TokenKind::Time {
                    self.token.kind = TokenKind::String;
                }
                let sr = self.simple(cmplx, nr)?;
                if sr == 0 {
                    if nr == 0 {
                        return Ok(false);
                    }
                } else if sr > 1 {
                    *cmplx = true;
                    r += sr - 1;
                }
            }
        }
        if self.kind().is_redirection() {
            *cmplx = true;
            while self.kind().is_redirection() {
                self.redirection(&mut r, None)?;
            }
        }
        self.state.in_cmd_pos = true;
        self.state.in_case_pat = CasePattern::No;
        self.state.in_cond = false;
        self.state.in_typeset = false;
        Ok(true)
    }

    /// Compiles one redirection, inserting its words at `*at` and moving
    /// `*at` past them. Returns the number of words inserted.
    pub(crate) fn redirection(
        &mut self,
        at: &mut usize,
        var_id: Option<&str>,
    ) -> Result<usize, CompileError> {
        let TokenKind::Redir(mut kind) = self.kind() else {
            return Err(self.unexpected());
        };
        let fd = self.token.fd;
        let old_cmd_pos = self.state.in_cmd_pos;
        self.state.in_cmd_pos = false;
        self.advance()?;
        if !matches!(self.kind(), TokenKind::String | TokenKind::EnvString) {
            return Err(self.unexpected());
        }
        self.state.in_cmd_pos = old_cmd_pos;
        let fd = fd.unwrap_or(if kind.reads() { 0 } else { 1 });
        let r = *at;
        let varid_mask = if var_id.is_some() {
            code::REDIR_VARID_MASK
        } else {
            0
        };

        if matches!(kind, RedirKind::HereDoc | RedirKind::HereDocDash) {
            // Body and terminators are filled in once the lexer has read
            // the document after the end of the line.
            let count = if var_id.is_some() { 6 } else { 5 };
            self.insert(r, count)?;
            *at = r + count;
            self.set(
                r,
                code::redir(kind, varid_mask | code::REDIR_FROM_HEREDOC_MASK),
            );
            self.set(r + 1, fd);
            if let Some(id) = var_id {
                let word = self.builder.str_code(id)?;
                self.set(r + 5, word);
            }
            self.builder.buffer.register_fixup(r);
            self.advance()?;
            return Ok(count);
        }

        let target = &self.token.text;
        let opens_input = target.starts_with("<(");
        let opens_output = target.starts_with(">(");
        match kind {
            RedirKind::Write | RedirKind::WriteNow => {
                if opens_output {
                    kind = RedirKind::OutPipe;
                } else if opens_input {
                    return Err(self.unexpected());
                }
            }
            RedirKind::Read => {
                if opens_input {
                    kind = RedirKind::InPipe;
                } else if opens_output {
                    return Err(self.unexpected());
                }
            }
            RedirKind::ReadWrite => {
                if opens_input {
                    kind = RedirKind::InPipe;
                } else if opens_output {
                    kind = RedirKind::OutPipe;
                }
            }
            _ => {}
        }
        let name = self.token.text.clone();
        self.advance()?;

        let count = if var_id.is_some() { 4 } else { 3 };
        self.insert(r, count)?;
        *at = r + count;
        self.set(r, code::redir(kind, varid_mask));
        self.set(r + 1, fd);
        let word = self.builder.str_code(&name)?;
        self.set(r + 2, word);
        if let Some(id) = var_id {
            let word = self.builder.str_code(id)?;
            self.set(r + 3, word);
        }
        Ok(count)
    }

    /// wordlist: `{ STRING }`
    pub(crate) fn wordlist(&mut self) -> Result<u32, CompileError> {
        let mut count = 0;
        while self.kind() == TokenKind::String {
            self.emit_token_text()?;
            count += 1;
            self.advance()?;
        }
        Ok(count)
    }

    /// nl_wordlist: `{ STRING | SEPER }`
    pub(crate) fn nl_wordlist(&mut self) -> Result<u32, CompileError> {
        let mut count = 0;
        while matches!(self.kind(), TokenKind::String | TokenKind::Seper) {
            if self.kind() == TokenKind::String {
                self.emit_token_text()?;
                count += 1;
            }
            self.advance()?;
        }
        Ok(count)
    }

    /// simple: assignments, words, redirections and `name ()` definitions.
    ///
    /// Returns 0 when nothing was compiled, else one plus the number of
    /// redirection words inserted ahead of the command.
    fn simple(&mut self, cmplx: &mut bool, mut nr: usize) -> Result<usize, CompileError> {
        let mut r = self.used();
        let mut c = *cmplx;
        let mut is_null = true;
        let mut assignments = false;

        loop {
            match self.kind() {
                TokenKind::NoCorrect => {
                    *cmplx = true;
                    c = true;
                }
                TokenKind::EnvString => {
                    let text = self.token.text.clone();
                    let (name, value, increment) = split_assignment(&text);
                    let mode = if increment {
                        AssignMode::Increment
                    } else {
                        AssignMode::New
                    };
                    self.emit(code::assign(AssignType::Scalar, mode, 0))?;
                    if has_process_substitution(value) {
                        *cmplx = true;
                    }
                    self.emit_str(name)?;
                    self.emit_str(value)?;
                    is_null = false;
                    assignments = true;
                }
                TokenKind::EnvArray => {
                    *cmplx = true;
                    c = true;
                    let p = self.emit(0)?;
                    let old_cmd_pos = self.state.in_cmd_pos;
                    self.state.in_cmd_pos = false;
                    let text = self.token.text.clone();
                    let (name, mode) = match text.strip_suffix('+') {
                        Some(name) if !name.is_empty() => (name, AssignMode::Increment),
                        _ => (text.as_str(), AssignMode::New),
                    };
                    self.emit_str(name)?;
                    self.advance()?;
                    let n = self.nl_wordlist()?;
                    self.set(p, code::assign(AssignType::Array, mode, n));
                    if self.kind() != TokenKind::OutPar {
                        return Err(self.unexpected_expecting(Some(")")));
                    }
                    self.state.in_cmd_pos = old_cmd_pos;
                    is_null = false;
                    assignments = true;
                }
                kind if kind.is_redirection() => {
                    *cmplx = true;
                    c = true;
                    nr += self.redirection(&mut r, None)?;
                    continue;
                }
                _ => break,
            }
            self.advance()?;
        }
        if matches!(self.kind(), TokenKind::Amper | TokenKind::AmperBang) {
            return Err(self.unexpected());
        }

        let mut p = self.emit(code::simple(0))?;
        let mut argc = 0u32;
        let mut sr = 0usize;
        let mut ppost = 0usize;
        let mut postassigns = 0u32;
        let mut is_typeset = false;
        let mut is_func = false;

        loop {
            match self.kind() {
                TokenKind::String | TokenKind::Typeset => {
                    *cmplx = true;
                    self.state.in_cmd_pos = false;
                    if self.kind() == TokenKind::Typeset {
                        self.state.in_typeset = true;
                        is_typeset = true;
                    }
                    let word = self.token.text.clone();
                    let var_id = if self.options.ignore_braces {
                        None
                    } else {
                        brace_identifier(&word).map(str::to_string)
                    };
                    if let Some(id) = var_id {
                        self.advance()?;
                        if self.kind().is_redirection() && self.token.fd.is_none() {
                            *cmplx = true;
                            c = true;
                            let n = self.redirection(&mut r, Some(&id))?;
                            p += n;
                            sr += n;
                        } else if postassigns > 0 {
                            postassigns += 1;
                            self.emit(code::assign(AssignType::Scalar, AssignMode::Increment, 0))?;
                            self.emit_str(&word)?;
                            self.emit_str("")?;
                        } else {
                            self.emit_str(&word)?;
                            argc += 1;
                        }
                    } else {
                        if postassigns > 0 {
                            // A bare name after a declaration's assignments.
                            postassigns += 1;
                            self.emit(code::assign(AssignType::Scalar, AssignMode::Increment, 0))?;
                            self.emit_str(&word)?;
                            self.emit_str("")?;
                        } else {
                            self.emit_str(&word)?;
                            argc += 1;
                        }
                        self.advance()?;
                    }
                }
                kind if kind.is_redirection() => {
                    *cmplx = true;
                    c = true;
                    let n = self.redirection(&mut r, None)?;
                    p += n;
                    if ppost != 0 {
                        ppost += n;
                    }
                    sr += n;
                }
                TokenKind::EnvString => {
                    if postassigns == 0 {
                        ppost = self.emit(0)?;
                    }
                    postassigns += 1;
                    let text = self.token.text.clone();
                    let (name, value, increment) = split_assignment(&text);
                    let mode = if increment {
                        AssignMode::Increment
                    } else {
                        AssignMode::New
                    };
                    self.emit(code::assign(AssignType::Scalar, mode, 0))?;
                    self.emit_str(name)?;
                    self.emit_str(value)?;
                    self.advance()?;
                }
                TokenKind::EnvArray => {
                    if postassigns == 0 {
                        ppost = self.emit(0)?;
                    }
                    postassigns += 1;
                    let parr = self.emit(0)?;
                    self.emit_token_text()?;
                    // No assignment words inside the array value.
                    self.state.in_typeset = false;
                    self.advance()?;
                    let n = self.nl_wordlist()?;
                    self.set(parr, code::assign(AssignType::Array, AssignMode::New, n));
                    self.state.in_typeset = true;
                    if self.kind() != TokenKind::OutPar {
                        return Err(self.unexpected_expecting(Some(")")));
                    }
                    self.advance()?;
                }
                TokenKind::InOutPar => {
                    if (!self.options.multi_func_def && argc > 1) || assignments || postassigns > 0 {
                        return Err(self.unexpected());
                    }
                    *cmplx = c;
                    self.named_function_body(p, argc)?;
                    if argc == 0 {
                        // Anonymous: the remaining words are its arguments.
                        let mut parg = self.emit(0)?;
                        self.emit(0)?;
                        loop {
                            match self.kind() {
                                TokenKind::String => {
                                    self.emit_token_text()?;
                                    argc += 1;
                                    self.advance()?;
                                }
                                kind if kind.is_redirection() => {
                                    *cmplx = true;
                                    let n = self.redirection(&mut r, None)?;
                                    p += n;
                                    if ppost != 0 {
                                        ppost += n;
                                    }
                                    sr += n;
                                    parg += n;
                                }
                                _ => break,
                            }
                        }
                        if argc > 0 {
                            *cmplx = true;
                        }
                        let span = (self.used() - parg) as u32;
                        self.set(parg, span);
                        self.set(parg + 1, argc);
                    }
                    is_func = true;
                    is_null = false;
                    break;
                }
                _ => break,
            }
            is_null = false;
        }

        if is_null && sr + nr == 0 {
            self.truncate(p);
            return Ok(0);
        }
        self.state.in_cmd_pos = true;
        self.state.in_typeset = false;

        if !is_func {
            if is_typeset {
                self.set(p, code::typeset(argc));
                if postassigns > 0 {
                    self.set(ppost, postassigns);
                } else {
                    self.emit(0)?;
                }
            } else {
                self.set(p, code::simple(argc));
            }
        }
        Ok(sr + 1)
    }

    /// Compiles the `() body` of `name ()`, turning the SIMPLE word at `p`
    /// and the `argc` names after it into a FUNCDEF.
    fn named_function_body(&mut self, p: usize, argc: u32) -> Result<(), CompileError> {
        let saved_base = self.line_base;
        self.line_base = self.token.line.saturating_sub(1);
        self.state.in_cmd_pos = true;
        self.advance()?;
        self.skip_separators()?;

        self.insert(p + 1, 1)?;
        self.set(p + 1, argc);
        for _ in 0..4 {
            self.emit(0)?;
        }
        let scope = self.builder.enter_function();
        let relative_start = scope.0.relative_start() as u32;

        if self.kind() == TokenKind::InBrace {
            let mut c = false;
            self.advance()?;
            self.list(&mut c)?;
            if self.kind() != TokenKind::OutBrace {
                return Err(self.unexpected_expecting(Some("}")));
            }
            if argc == 0 {
                self.state.in_cmd_pos = false;
            }
            self.advance()?;
        } else {
            let mut c = false;
            let ll = self.emit(0)?;
            let sl = self.emit(0)?;
            self.emit(code::pipe(PipeType::End, 0))?;
            if !self.cmd(&mut c, argc == 0)? {
                return Err(self.unexpected());
            }
            if argc == 0 {
                self.state.in_cmd_pos = false;
            }
            let skip = self.skip_from(sl);
            self.set_sublist_code(sl, SublistType::End, SublistFlags::empty(), skip, c);
            self.set_list_code(ll, ListType::SYNC | ListType::END, c);
        }
        self.emit(END)?;

        let (strings_len, patterns) = self.builder.leave_function(scope);
        let header = p + argc as usize + 2;
        self.set(header, relative_start);
        self.set(header + 1, strings_len as u32);
        self.set(header + 2, patterns);
        self.set(header + 3, 0);
        let skip = self.skip_from(p);
        self.set(p, code::funcdef(skip));
        self.line_base = saved_base;
        Ok(())
    }

    /// funcdef: `function [-T] [--] names [()] body [args]`
    pub(crate) fn funcdef(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let saved_base = self.line_base;
        self.line_base = self.token.line.saturating_sub(1);
        self.state.in_cmd_pos = false;
        self.advance()?;

        let p = self.emit(0)?;
        self.emit(0)?;

        let mut tracing = 0;
        if self.kind() == TokenKind::String && self.token.text.starts_with('-') {
            if self.token.text == "-T" {
                tracing = 1;
                self.advance()?;
            }
            if self.at_word("--") {
                self.advance()?;
            }
        }

        let mut num = 0u32;
        while self.kind() == TokenKind::String {
            if self.token.text == "{" {
                self.token.kind = TokenKind::InBrace;
                break;
            }
            self.emit_token_text()?;
            num += 1;
            self.advance()?;
        }
        for _ in 0..4 {
            self.emit(0)?;
        }

        self.state.in_cmd_pos = true;
        if self.kind() == TokenKind::InOutPar {
            self.advance()?;
        }
        self.skip_separators()?;

        let scope = self.builder.enter_function();
        let relative_start = scope.0.relative_start() as u32;
        let mut c = false;
        if self.kind() == TokenKind::InBrace {
            self.advance()?;
            self.list(&mut c)?;
            if self.kind() != TokenKind::OutBrace {
                return Err(self.unexpected_expecting(Some("}")));
            }
            if num == 0 {
                self.state.in_cmd_pos = false;
            }
            self.advance()?;
        } else if !self.options.short_loops {
            return Err(self.unexpected_expecting(Some("{")));
        } else {
            self.list1(&mut c)?;
        }
        self.emit(END)?;

        let (strings_len, patterns) = self.builder.leave_function(scope);
        let header = p + num as usize + 2;
        self.set(header, relative_start);
        self.set(header + 1, strings_len as u32);
        self.set(header + 2, patterns);
        self.set(header + 3, tracing);
        self.set(p + 1, num);
        let skip = self.skip_from(p);
        self.set(p, code::funcdef(skip));

        if num == 0 {
            let parg = self.emit(0)?;
            self.emit(0)?;
            while self.kind() == TokenKind::String {
                self.emit_token_text()?;
                num += 1;
                self.advance()?;
            }
            if num > 0 {
                *cmplx = true;
            }
            let span = (self.used() - parg) as u32;
            self.set(parg, span);
            self.set(parg + 1, num);
        }
        self.line_base = saved_base;
        Ok(())
    }

    /// time: `TIME [ sublist2 ]`
    fn time(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        let p = self.emit(0)?;
        self.emit(0)?;
        let mut c = false;
        match self.sublist2(&mut c)? {
            None => {
                self.truncate(p + 1);
                self.set(p, code::timed(TimedType::Empty));
            }
            Some(flags) => {
                self.set(p, code::timed(TimedType::Pipe));
                let skip = (self.used() - 2 - p) as u32;
                self.set_sublist_code(p + 1, SublistType::End, flags, skip, c);
            }
        }
        Ok(())
    }
}
