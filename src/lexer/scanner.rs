//! Reference lexer for shell text.

use std::collections::VecDeque;

use crate::lexer::alias::{AliasTable, MAX_EXPANSION_DEPTH};
use crate::lexer::cursor::Cursor;
use crate::lexer::heredoc::{HereDocument, PendingHereDoc, read_body};
use crate::lexer::operator::{is_word_break, match_operator};
use crate::lexer::token::{Token, TokenKind, reserved_word};
use crate::lexer::{CasePattern, LexState, TokenSource};
use crate::wordcode::code::RedirKind;

/// Result of scanning one word.
struct Word {
    text: String,
    quoted: bool,
    array_open: bool,
}

/// Tokenizer for zsh-like shell text.
///
/// Recognises quoting, substitutions, comments, line continuations, the
/// operator set, leading descriptor numbers on redirections, assignment
/// words, reserved words in command position, and here-document bodies
/// (read after the newline that ends the line holding their operators).
pub struct Lexer {
    input: String,
    cursor: Cursor,
    aliases: AliasTable,
    alias_guards: Vec<(String, usize)>,
    queued: VecDeque<Token>,
    pending: Vec<PendingHereDoc>,
    documents: Vec<HereDocument>,
    heredoc_operator: Option<bool>,
}

impl Lexer {
    /// Creates a lexer over `input`.
    pub fn new(input: &str) -> Self {
        Self::with_aliases(input, AliasTable::new())
    }

    /// Creates a lexer that expands `aliases` in command position.
    pub fn with_aliases(input: &str, aliases: AliasTable) -> Self {
        Self {
            input: input.to_string(),
            cursor: Cursor::new(),
            aliases,
            alias_guards: Vec::new(),
            queued: VecDeque::new(),
            pending: Vec::new(),
            documents: Vec::new(),
            heredoc_operator: None,
        }
    }

    /// Returns the current line number.
    pub fn line(&self) -> u32 {
        self.cursor.line()
    }

    /// Tokenizes the whole input with default steering, for inspection.
    pub fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Self::new(input);
        let mut state = LexState::default();
        let mut tokens = Vec::new();
        loop {
            let token = lexer.advance(&state);
            let done = matches!(token.kind, TokenKind::EndInput | TokenKind::LexErr);
            state.in_cmd_pos = matches!(
                token.kind,
                TokenKind::Seper
                    | TokenKind::Amper
                    | TokenKind::AmperBang
                    | TokenKind::Damper
                    | TokenKind::Dbar
                    | TokenKind::Bar
                    | TokenKind::BarAmp
                    | TokenKind::InPar
                    | TokenKind::InBrace
                    | TokenKind::EnvString
            ) || (state.in_cmd_pos && reserved_word(&token.text).is_some());
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn next_token(&mut self, state: &LexState) -> Token {
        if let Some(token) = self.queued.pop_front() {
            return token;
        }
        loop {
            self.skip_blanks();
            let line = self.cursor.line();
            let Some(byte) = self.cursor.peek_byte(&self.input) else {
                self.flush_unterminated_heredocs();
                return Token::new(TokenKind::EndInput, "", line);
            };

            if byte == b'#' {
                self.skip_comment();
                continue;
            }
            if byte == b'\n' {
                self.cursor.advance_byte(&self.input);
                self.read_pending_heredocs();
                let mut token = Token::new(TokenKind::Seper, "\n", line);
                token.newline = true;
                return token;
            }
            if let Some(token) = self.scan_special(state, line) {
                return token;
            }
            if let Some(token) = self.scan_redirection_with_fd(line) {
                return token;
            }
            if !self.at_process_substitution() {
                if let Some((kind, text)) = match_operator(self.tail()) {
                    self.cursor.advance_by(text.len(), &self.input);
                    if let TokenKind::Redir(kind) = kind {
                        self.note_redirection(kind);
                    }
                    return Token::new(kind, text, line);
                }
            }

            let start = self.cursor.offset();
            let word = match self.scan_word(state) {
                Ok(word) => word,
                Err(message) => return Token::new(TokenKind::LexErr, message, line),
            };
            if let Some(strip_tabs) = self.heredoc_operator.take() {
                self.pending.push(PendingHereDoc::new(&word.text, strip_tabs));
                return Token::new(TokenKind::String, word.text, line);
            }
            if self.try_expand_alias(state, &word, start) {
                continue;
            }
            return self.classify_word(state, word, line);
        }
    }

    fn tail(&self) -> &[u8] {
        &self.input.as_bytes()[self.cursor.offset().min(self.input.len())..]
    }

    fn skip_blanks(&mut self) {
        loop {
            match self.cursor.peek_byte(&self.input) {
                Some(b' ' | b'\t') => {
                    self.cursor.advance_byte(&self.input);
                }
                Some(b'\\') if self.cursor.peek_at(&self.input, 1) == Some(b'\n') => {
                    self.cursor.advance_by(2, &self.input);
                }
                _ => return,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(byte) = self.cursor.peek_byte(&self.input) {
            if byte == b'\n' {
                return;
            }
            self.cursor.advance_byte(&self.input);
        }
    }

    fn read_pending_heredocs(&mut self) {
        for queued in std::mem::take(&mut self.pending) {
            let document = read_body(&mut self.cursor, &self.input, queued);
            self.documents.push(document);
        }
    }

    fn flush_unterminated_heredocs(&mut self) {
        for queued in std::mem::take(&mut self.pending) {
            self.documents.push(HereDocument {
                body: String::new(),
                raw_terminator: queued.raw_delimiter,
                munged_terminator: queued.delimiter_key,
                strip_tabs: queued.strip_tabs,
            });
        }
    }

    fn note_redirection(&mut self, kind: RedirKind) {
        self.heredoc_operator = match kind {
            RedirKind::HereDoc => Some(false),
            RedirKind::HereDocDash => Some(true),
            _ => None,
        };
    }

    /// Handles `((`, `[[` and `]]`, which depend on the steering flags.
    fn scan_special(&mut self, state: &LexState, line: u32) -> Option<Token> {
        if self.cursor.starts_with(&self.input, "((") && (state.in_for || state.in_cmd_pos) {
            let checkpoint = self.cursor;
            self.cursor.advance_by(2, &self.input);
            match self.scan_arithmetic() {
                Some(body) if state.in_for => {
                    let parts = split_for_head(&body);
                    if parts.len() != 3 {
                        return Some(Token::new(
                            TokenKind::LexErr,
                            "bad arithmetic for loop head",
                            line,
                        ));
                    }
                    self.queued
                        .push_back(Token::new(TokenKind::DinPar, parts[0].trim(), line));
                    self.queued
                        .push_back(Token::new(TokenKind::DinPar, parts[1].trim(), line));
                    self.queued
                        .push_back(Token::new(TokenKind::DoutPar, parts[2].trim(), line));
                    return Some(Token::new(TokenKind::DinPar, "((", line));
                }
                Some(body) => return Some(Token::new(TokenKind::DinPar, body, line)),
                None => self.cursor = checkpoint,
            }
        }
        if state.in_cmd_pos && self.word_is(b"[[") {
            self.cursor.advance_by(2, &self.input);
            return Some(Token::new(TokenKind::DinBrack, "[[", line));
        }
        if state.in_cond && self.word_is(b"]]") {
            self.cursor.advance_by(2, &self.input);
            return Some(Token::new(TokenKind::DoutBrack, "]]", line));
        }
        None
    }

    fn word_is(&self, text: &[u8]) -> bool {
        let tail = self.tail();
        tail.starts_with(text)
            && tail
                .get(text.len())
                .is_none_or(|&byte| is_word_break(byte))
    }

    /// Scans `((...))` after the opener and returns the inner text.
    fn scan_arithmetic(&mut self) -> Option<String> {
        let start = self.cursor.offset();
        let mut depth = 2usize;
        while let Some(byte) = self.cursor.advance_byte(&self.input) {
            match byte {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = self.cursor.offset() - 2;
                        return self.input.get(start..end).map(str::to_string);
                    }
                    if depth == 1 && self.cursor.peek_byte(&self.input) != Some(b')') {
                        return None;
                    }
                }
                b'\'' | b'"' => {
                    if self.skip_quoted(byte).is_err() {
                        return None;
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn scan_redirection_with_fd(&mut self, line: u32) -> Option<Token> {
        let tail = self.tail();
        let digits = tail.iter().take_while(|byte| byte.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let (kind, text) = match_operator(&tail[digits..])?;
        let TokenKind::Redir(redir) = kind else {
            return None;
        };
        let fd = std::str::from_utf8(&tail[..digits]).ok()?.parse().ok()?;
        self.cursor.advance_by(digits + text.len(), &self.input);
        self.note_redirection(redir);
        let mut token = Token::new(kind, text, line);
        token.fd = Some(fd);
        Some(token)
    }

    fn at_process_substitution(&self) -> bool {
        let tail = self.tail();
        matches!(tail, [b'<' | b'>', b'(', ..])
    }

    fn scan_word(&mut self, state: &LexState) -> Result<Word, String> {
        let assignments = (state.in_cmd_pos || state.in_typeset) && !state.in_cond;
        let glob_parens = !state.in_cmd_pos
            && !state.in_cond
            && !state.in_typeset
            && state.in_case_pat == CasePattern::No;
        let mut buf: Vec<u8> = Vec::new();
        let mut quoted = false;
        let mut depth = 0usize;

        if self.at_process_substitution()
            || (self.cursor.starts_with(&self.input, "=(")
                && state.in_case_pat == CasePattern::No
                && !state.in_cond)
        {
            self.push_advance(&mut buf, 2);
            self.consume_group(&mut buf, b')')?;
        }

        while let Some(byte) = self.cursor.peek_byte(&self.input) {
            if depth > 0 {
                match byte {
                    b' ' | b'\t' | b'\n' => break,
                    b')' => depth -= 1,
                    b'(' => depth += 1,
                    _ => {}
                }
                if !matches!(byte, b'\\' | b'\'' | b'"' | b'`' | b'$') {
                    self.push_advance(&mut buf, 1);
                    continue;
                }
            } else if is_word_break(byte) {
                if byte != b'(' || buf.is_empty() {
                    break;
                }
                if assignments && is_assignment_prefix(&buf) {
                    self.cursor.advance_byte(&self.input);
                    return Ok(Word {
                        text: bytes_to_string(buf),
                        quoted,
                        array_open: true,
                    });
                }
                if !glob_parens || self.cursor.peek_at(&self.input, 1) == Some(b')') {
                    break;
                }
                depth += 1;
                self.push_advance(&mut buf, 1);
                continue;
            }

            match byte {
                b'\\' => {
                    if self.cursor.peek_at(&self.input, 1) == Some(b'\n') {
                        self.cursor.advance_by(2, &self.input);
                    } else {
                        quoted = true;
                        self.push_advance(&mut buf, 2);
                    }
                }
                b'\'' => {
                    quoted = true;
                    self.push_advance(&mut buf, 1);
                    self.consume_single(&mut buf)?;
                }
                b'"' => {
                    quoted = true;
                    self.push_advance(&mut buf, 1);
                    self.consume_double(&mut buf)?;
                }
                b'`' => {
                    self.push_advance(&mut buf, 1);
                    self.consume_backquote(&mut buf)?;
                }
                b'$' => self.consume_dollar(&mut buf)?,
                _ => self.push_advance(&mut buf, 1),
            }
        }

        Ok(Word {
            text: bytes_to_string(buf),
            quoted,
            array_open: false,
        })
    }

    fn push_advance(&mut self, buf: &mut Vec<u8>, count: usize) {
        for _ in 0..count {
            match self.cursor.advance_byte(&self.input) {
                Some(byte) => buf.push(byte),
                None => return,
            }
        }
    }

    fn consume_single(&mut self, buf: &mut Vec<u8>) -> Result<(), String> {
        while let Some(byte) = self.cursor.advance_byte(&self.input) {
            buf.push(byte);
            if byte == b'\'' {
                return Ok(());
            }
        }
        Err("unmatched '".to_string())
    }

    fn consume_double(&mut self, buf: &mut Vec<u8>) -> Result<(), String> {
        while let Some(byte) = self.cursor.peek_byte(&self.input) {
            match byte {
                b'"' => {
                    self.push_advance(buf, 1);
                    return Ok(());
                }
                b'\\' => self.push_advance(buf, 2),
                b'`' => {
                    self.push_advance(buf, 1);
                    self.consume_backquote(buf)?;
                }
                b'$' => self.consume_dollar(buf)?,
                _ => self.push_advance(buf, 1),
            }
        }
        Err("unmatched \"".to_string())
    }

    fn consume_backquote(&mut self, buf: &mut Vec<u8>) -> Result<(), String> {
        while let Some(byte) = self.cursor.peek_byte(&self.input) {
            match byte {
                b'`' => {
                    self.push_advance(buf, 1);
                    return Ok(());
                }
                b'\\' => self.push_advance(buf, 2),
                _ => self.push_advance(buf, 1),
            }
        }
        Err("unmatched `".to_string())
    }

    fn consume_dollar(&mut self, buf: &mut Vec<u8>) -> Result<(), String> {
        match self.cursor.peek_at(&self.input, 1) {
            Some(b'(') => {
                self.push_advance(buf, 2);
                self.consume_group(buf, b')')
            }
            Some(b'{') => {
                self.push_advance(buf, 2);
                self.consume_group(buf, b'}')
            }
            Some(b'\'') => {
                self.push_advance(buf, 2);
                while let Some(byte) = self.cursor.peek_byte(&self.input) {
                    match byte {
                        b'\\' => self.push_advance(buf, 2),
                        b'\'' => {
                            self.push_advance(buf, 1);
                            return Ok(());
                        }
                        _ => self.push_advance(buf, 1),
                    }
                }
                Err("unmatched '".to_string())
            }
            _ => {
                self.push_advance(buf, 1);
                Ok(())
            }
        }
    }

    /// Consumes up to the `close` byte matching an already consumed opener.
    fn consume_group(&mut self, buf: &mut Vec<u8>, close: u8) -> Result<(), String> {
        let open = if close == b')' { b'(' } else { b'{' };
        let mut depth = 1usize;
        while let Some(byte) = self.cursor.peek_byte(&self.input) {
            match byte {
                b'\\' => self.push_advance(buf, 2),
                b'\'' => {
                    self.push_advance(buf, 1);
                    self.consume_single(buf)?;
                }
                b'"' => {
                    self.push_advance(buf, 1);
                    self.consume_double(buf)?;
                }
                b'`' => {
                    self.push_advance(buf, 1);
                    self.consume_backquote(buf)?;
                }
                _ => {
                    self.push_advance(buf, 1);
                    if byte == open {
                        depth += 1;
                    } else if byte == close {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(());
                        }
                    }
                }
            }
        }
        Err(format!("unmatched {}", open as char))
    }

    fn skip_quoted(&mut self, quote: u8) -> Result<(), ()> {
        while let Some(byte) = self.cursor.advance_byte(&self.input) {
            if byte == b'\\' && quote == b'"' {
                self.cursor.advance_byte(&self.input);
            } else if byte == quote {
                return Ok(());
            }
        }
        Err(())
    }

    fn try_expand_alias(&mut self, state: &LexState, word: &Word, start: usize) -> bool {
        if !state.in_cmd_pos || state.no_aliases || word.quoted || word.array_open {
            return false;
        }
        let end = self.cursor.offset();
        self.alias_guards.retain(|(_, guard_end)| *guard_end > start);
        if self.alias_guards.len() >= MAX_EXPANSION_DEPTH
            || self.alias_guards.iter().any(|(name, _)| *name == word.text)
        {
            return false;
        }
        let Some(value) = self.aliases.get(&word.text).map(str::to_string) else {
            return false;
        };
        self.input.replace_range(start..end, &value);
        let delta = value.len() as isize - (end - start) as isize;
        for (_, guard_end) in &mut self.alias_guards {
            *guard_end = guard_end.saturating_add_signed(delta);
        }
        self.alias_guards.push((word.text.clone(), start + value.len()));
        self.rewind_to(start);
        true
    }

    fn rewind_to(&mut self, offset: usize) {
        let mut cursor = Cursor::new();
        cursor.seek(offset, &self.input);
        self.cursor = cursor;
    }

    fn classify_word(&mut self, state: &LexState, word: Word, line: u32) -> Token {
        if word.array_open {
            let name = word
                .text
                .strip_suffix('=')
                .unwrap_or(&word.text)
                .to_string();
            return Token::new(TokenKind::EnvArray, name, line);
        }
        if !word.quoted {
            if word.text == "}" && state.in_case_pat != CasePattern::Yes {
                return Token::new(TokenKind::OutBrace, word.text, line);
            }
            if state.in_cmd_pos && state.in_case_pat != CasePattern::Yes {
                if let Some(kind) = reserved_word(&word.text) {
                    return Token::new(kind, word.text, line);
                }
            }
        }
        if state.in_cond && !word.quoted && word.text == "!" {
            return Token::new(TokenKind::Bang, word.text, line);
        }
        let assignments = (state.in_cmd_pos || state.in_typeset) && !state.in_cond;
        if assignments && assignment_split(&word.text).is_some() {
            return Token::new(TokenKind::EnvString, word.text, line);
        }
        Token::new(TokenKind::String, word.text, line)
    }
}

impl TokenSource for Lexer {
    fn advance(&mut self, state: &LexState) -> Token {
        self.next_token(state)
    }

    fn take_here_documents(&mut self) -> Vec<HereDocument> {
        std::mem::take(&mut self.documents)
    }
}

/// Splits `name=value`, `name+=value` or `name[sub]=value` at the `=`.
///
/// Returns the byte index of `=`.
pub(crate) fn assignment_split(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut index = 0;
    while index < bytes.len() && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_') {
        index += 1;
    }
    if index == 0 || bytes[0].is_ascii_digit() {
        return None;
    }
    if bytes.get(index) == Some(&b'[') {
        let mut depth = 0usize;
        while index < bytes.len() {
            match bytes[index] {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        index += 1;
                        break;
                    }
                }
                _ => {}
            }
            index += 1;
        }
        if depth != 0 {
            return None;
        }
    }
    if bytes.get(index) == Some(&b'+') {
        index += 1;
    }
    (bytes.get(index) == Some(&b'=')).then_some(index)
}

fn is_assignment_prefix(buf: &[u8]) -> bool {
    std::str::from_utf8(buf)
        .ok()
        .and_then(assignment_split)
        .is_some_and(|index| index + 1 == buf.len())
}

fn split_for_head(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, byte) in body.bytes().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b';' if depth == 0 => {
                parts.push(&body[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn bytes_to_string(buf: Vec<u8>) -> String {
    String::from_utf8(buf)
        .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned())
}
