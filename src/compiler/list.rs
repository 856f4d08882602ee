//! Events, lists, sublists and pipelines.

use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::lexer::{TokenKind, TokenSource};
use crate::wordcode::code::{self, END, ListType, PipeType, RedirKind, SublistFlags, SublistType, Tag};

impl<S: TokenSource> Compiler<S> {
    /// event: `{ SEPER } [ sublist [ SEPER | AMPER | AMPERBANG ] ]...`
    ///
    /// Compiles sublists until the end of the current line (or `end`).
    /// Returns `false` when there was nothing to compile.
    pub(super) fn event(&mut self, end: TokenKind) -> Result<bool, CompileError> {
        let mut previous: Option<usize> = None;
        loop {
            while self.kind() == TokenKind::Seper {
                if self.token.newline && end == TokenKind::EndInput {
                    return Ok(self.close_event(previous));
                }
                self.advance()?;
            }
            if self.kind() == TokenKind::EndInput {
                return Ok(self.close_event(previous));
            }
            if self.kind() == end {
                return Ok(true);
            }

            let p = self.emit(0)?;
            let mut cmplx = false;
            if !self.sublist(&mut cmplx)? {
                return Err(self.unexpected());
            }
            match self.kind() {
                kind if kind == TokenKind::EndInput || kind == end => {
                    self.set_list_code(p, ListType::SYNC, cmplx);
                }
                TokenKind::Seper => {
                    self.set_list_code(p, ListType::SYNC, cmplx);
                    if !(self.token.newline && end == TokenKind::EndInput) {
                        self.advance()?;
                    }
                }
                TokenKind::Amper => {
                    self.set_list_code(p, ListType::ASYNC, cmplx);
                    self.advance()?;
                }
                TokenKind::AmperBang => {
                    self.set_list_code(p, ListType::ASYNC | ListType::DISOWN, cmplx);
                    self.advance()?;
                }
                _ => return Err(self.unexpected()),
            }
            previous = Some(p);
        }
    }

    fn close_event(&mut self, previous: Option<usize>) -> bool {
        match previous {
            Some(p) => {
                let word = self.get(p);
                self.set(p, word | code::bdata(ListType::END.bits()));
                true
            }
            None => false,
        }
    }

    /// list: `{ SEPER } [ sublist [ { SEPER | AMPER | AMPERBANG } list ] ]`
    pub(crate) fn list(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let mut last: Option<usize> = None;
        loop {
            self.skip_separators()?;
            let p = self.emit(0)?;
            let mut c = false;
            if !self.sublist(&mut c)? {
                self.truncate(p);
                if let Some(lp) = last {
                    let word = self.get(lp);
                    self.set(lp, word | code::bdata(ListType::END.bits()));
                }
                return Ok(());
            }
            *cmplx |= c;
            let kind = match self.kind() {
                TokenKind::Seper => ListType::SYNC,
                TokenKind::Amper => ListType::ASYNC,
                TokenKind::AmperBang => ListType::ASYNC | ListType::DISOWN,
                _ => {
                    self.set_list_code(p, ListType::SYNC | ListType::END, c);
                    return Ok(());
                }
            };
            if kind != ListType::SYNC {
                *cmplx = true;
            }
            self.set_list_code(p, kind, c);
            self.state.in_cmd_pos = true;
            loop {
                self.advance()?;
                if self.kind() != TokenKind::Seper {
                    break;
                }
            }
            last = Some(p);
        }
    }

    /// list1: a single sublist ending the list.
    pub(crate) fn list1(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let p = self.emit(0)?;
        let mut c = false;
        if self.sublist(&mut c)? {
            self.set_list_code(p, ListType::SYNC | ListType::END, c);
            *cmplx |= c;
        } else {
            self.truncate(p);
        }
        Ok(())
    }

    /// A list that always occupies at least one word.
    pub(crate) fn save_list(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let start = self.used();
        self.list(cmplx)?;
        if self.used() == start {
            self.emit(END)?;
        }
        Ok(())
    }

    pub(crate) fn save_list1(&mut self, cmplx: &mut bool) -> Result<(), CompileError> {
        let start = self.used();
        self.list1(cmplx)?;
        if self.used() == start {
            self.emit(END)?;
        }
        Ok(())
    }

    /// sublist: `sublist2 [ ( DBAR | DAMPER ) { SEPER } sublist ]`
    pub(crate) fn sublist(&mut self, cmplx: &mut bool) -> Result<bool, CompileError> {
        let p = self.emit(0)?;
        let mut c = false;
        let Some(flags) = self.sublist2(&mut c)? else {
            self.truncate(p);
            return Ok(false);
        };
        let end = self.used();
        *cmplx |= c;
        let skip = (end - 1 - p) as u32;
        match self.kind() {
            kind @ (TokenKind::Dbar | TokenKind::Damper) => {
                self.advance()?;
                self.skip_separators()?;
                let kind = if self.sublist(cmplx)? {
                    if kind == TokenKind::Dbar {
                        SublistType::Or
                    } else {
                        SublistType::And
                    }
                } else {
                    SublistType::End
                };
                self.set_sublist_code(p, kind, flags, skip, c);
            }
            kind => {
                if matches!(kind, TokenKind::Amper | TokenKind::AmperBang) {
                    c = true;
                    *cmplx = true;
                }
                self.set_sublist_code(p, SublistType::End, flags, skip, c);
            }
        }
        Ok(true)
    }

    /// sublist2: `[ COPROC | BANG ] pline`
    pub(crate) fn sublist2(&mut self, cmplx: &mut bool) -> Result<Option<SublistFlags>, CompileError> {
        let mut flags = SublistFlags::empty();
        match self.kind() {
            TokenKind::Coproc => {
                *cmplx = true;
                flags |= SublistFlags::COPROC;
                self.advance()?;
            }
            TokenKind::Bang => {
                *cmplx = true;
                flags |= SublistFlags::NOT;
                self.advance()?;
            }
            _ => {}
        }
        if !self.pipeline(cmplx)? && flags.is_empty() {
            return Ok(None);
        }
        Ok(Some(flags))
    }

    /// pline: `cmd [ ( BAR | BARAMP ) { SEPER } pline ]`
    fn pipeline(&mut self, cmplx: &mut bool) -> Result<bool, CompileError> {
        let line = self.line();
        let p = self.emit(0)?;
        if !self.cmd(cmplx, false)? {
            self.truncate(p);
            return Ok(false);
        }
        match self.kind() {
            TokenKind::Bar => {}
            TokenKind::BarAmp => {
                // `a |& b` is `a 2>&1 | b`: the merge goes after the
                // command's own leading redirections.
                let mut r = p + 1;
                while Tag::of(self.get(r)) == Some(Tag::Redir) {
                    r += code::redir_words(self.get(r));
                }
                self.insert(r, 3)?;
                self.set(r, code::redir(RedirKind::MergeOut, 0));
                self.set(r + 1, 2);
                let one = self.builder.str_code("1")?;
                self.set(r + 2, one);
            }
            _ => {
                self.set(p, code::pipe(PipeType::End, line));
                return Ok(true);
            }
        }
        *cmplx = true;
        self.advance()?;
        self.skip_separators()?;
        self.set(p, code::pipe(PipeType::Mid, line));
        self.insert(p + 1, 1)?;
        let offset = self.skip_from(p);
        self.set(p + 1, offset);
        if !self.pipeline(cmplx)? {
            return Err(self.unexpected());
        }
        Ok(true)
    }

    /// Fills the LIST word at `p`, folding a lone simple sublist into it.
    pub(crate) fn set_list_code(&mut self, p: usize, kind: ListType, cmplx: bool) {
        let next = self.get(p + 1);
        let foldable = kind == ListType::SYNC || kind == (ListType::SYNC | ListType::END);
        if !cmplx && foldable && code::sublist_type(next) == SublistType::End {
            let is_pipe = !code::sublist_flags(next).contains(SublistFlags::SIMPLE);
            let skip = (self.used() - 2 - p) as u32;
            self.set(p, code::list(kind | ListType::SIMPLE, skip));
            self.builder.buffer.delete(p + 1);
            if is_pipe {
                let pipe = self.get(p + 1);
                self.set(p + 1, code::pipe_line(pipe));
            }
        } else {
            self.set(p, code::list(kind, 0));
        }
    }

    /// Fills the SUBLIST word at `p`; a simple sublist keeps only the
    /// pipeline's line number.
    pub(crate) fn set_sublist_code(
        &mut self,
        p: usize,
        kind: SublistType,
        flags: SublistFlags,
        skip: u32,
        cmplx: bool,
    ) {
        if cmplx {
            self.set(p, code::sublist(kind, flags, skip));
        } else {
            self.set(p, code::sublist(kind, flags | SublistFlags::SIMPLE, skip));
            let pipe = self.get(p + 1);
            self.set(p + 1, code::pipe_line(pipe));
        }
    }
}
