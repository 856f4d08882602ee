//! Reading compiled programs: a word cursor, string and redirection
//! decoding, and a textual disassembler.

use std::fmt::Write as _;

use crate::wordcode::code::{
    self, ForType, ListType, PipeType, RedirKind, SublistFlags, SublistType, Tag, Wordcode, cond,
};
use crate::wordcode::program::Program;
use crate::wordcode::strings::StringRef;

// ===========================================================================
// ProgramCursor
// ===========================================================================

/// Sequential reader over a program's words.
///
/// String references are resolved against the string base, which is the
/// start of the enclosing function body's string range (0 at top level).
#[derive(Debug, Clone)]
pub struct ProgramCursor<'p> {
    program: &'p Program,
    pc: usize,
    string_base: usize,
}

/// A decoded redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    /// Redirection kind.
    pub kind: RedirKind,
    /// Descriptor being redirected.
    pub fd: u32,
    /// Target word, or the document body for a here-document.
    pub name: String,
    /// Raw and munged terminators of a here-document.
    pub here_terminator: Option<(String, String)>,
    /// Variable receiving the descriptor for `{var}>file`.
    pub var_id: Option<String>,
}

impl<'p> ProgramCursor<'p> {
    /// Creates a cursor at the first word.
    pub fn new(program: &'p Program) -> Self {
        Self::at(program, 0)
    }

    /// Creates a cursor at `pc`.
    pub fn at(program: &'p Program, pc: usize) -> Self {
        Self {
            program,
            pc,
            string_base: 0,
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    /// Moves forward by `words`.
    pub fn skip(&mut self, words: usize) {
        self.pc += words;
    }

    pub fn string_base(&self) -> usize {
        self.string_base
    }

    pub fn set_string_base(&mut self, base: usize) {
        self.string_base = base;
    }

    /// Returns `true` once the cursor is past the last word.
    pub fn at_end(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Returns the word at the cursor without consuming it.
    pub fn peek(&self) -> Wordcode {
        self.program.word(self.pc)
    }

    /// Consumes one word.
    pub fn next_word(&mut self) -> Wordcode {
        let word = self.program.word(self.pc);
        self.pc += 1;
        word
    }

    /// Resolves a string reference word.
    pub fn string(&self, word: Wordcode) -> String {
        match StringRef::decode(word) {
            StringRef::Inline { bytes, len, .. } => String::from_utf8_lossy(&bytes[..len]).into_owned(),
            StringRef::Table { offset, .. } => {
                let strings = self.program.strings();
                let start = self.string_base + offset;
                let tail = strings.get(start..).unwrap_or(&[]);
                let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
                String::from_utf8_lossy(&tail[..end]).into_owned()
            }
        }
    }

    /// Consumes one string reference.
    pub fn read_string(&mut self) -> String {
        let word = self.next_word();
        self.string(word)
    }

    /// Consumes `count` string references.
    pub fn read_strings(&mut self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.read_string()).collect()
    }

    /// Consumes a redirection, or returns `None` when the cursor is not
    /// at one.
    pub fn read_redirection(&mut self) -> Option<Redirection> {
        let word = self.peek();
        if Tag::of(word) != Some(Tag::Redir) {
            return None;
        }
        let kind = code::redir_kind(word)?;
        self.pc += 1;
        let fd = self.next_word();
        let name = self.read_string();
        let here_terminator = code::redir_from_heredoc(word).then(|| {
            let raw = self.read_string();
            let munged = self.read_string();
            (raw, munged)
        });
        let var_id = code::redir_has_varid(word).then(|| self.read_string());
        Some(Redirection {
            kind,
            fd,
            name,
            here_terminator,
            var_id,
        })
    }
}

// ===========================================================================
// Disassembler
// ===========================================================================

/// Renders a program one instruction per line, operands decoded.
///
/// Each line starts with the word index. String operands are quoted;
/// raw counts and offsets are shown as numbers.
pub fn disassemble(program: &Program) -> String {
    Disassembler::new(program).run()
}

/// Operands that follow a block's closing END rather than its head.
#[derive(Debug, Clone, Copy)]
enum Trailer {
    /// Anonymous function arguments: span and count words, then strings.
    FunctionArgs,
}

struct Disassembler<'p> {
    cursor: ProgramCursor<'p>,
    out: String,
    /// Function bodies being walked: last word index and outer base.
    scopes: Vec<(usize, usize)>,
    trailers: Vec<(usize, Trailer)>,
}

impl<'p> Disassembler<'p> {
    fn new(program: &'p Program) -> Self {
        Self {
            cursor: ProgramCursor::new(program),
            out: String::new(),
            scopes: Vec::new(),
            trailers: Vec::new(),
        }
    }

    fn run(mut self) -> String {
        while !self.cursor.at_end() {
            while let Some(&(end, outer)) = self.scopes.last() {
                if self.cursor.pc() <= end {
                    break;
                }
                self.scopes.pop();
                self.cursor.set_string_base(outer);
            }
            let pc = self.cursor.pc();
            if let Some(index) = self.trailers.iter().position(|(at, _)| *at == pc) {
                let (_, trailer) = self.trailers.remove(index);
                self.trailer(trailer);
            } else {
                self.instruction();
            }
        }
        self.out
    }

    fn quoted(&mut self, count: usize) -> String {
        self.cursor
            .read_strings(count)
            .iter()
            .map(|s| format!("{s:?}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn line(&mut self, pc: usize, text: &str) {
        let _ = writeln!(self.out, "{pc:>5}  {}", text.trim_end());
    }

    fn trailer(&mut self, trailer: Trailer) {
        let pc = self.cursor.pc();
        match trailer {
            Trailer::FunctionArgs => {
                let _span = self.cursor.next_word();
                let argc = self.cursor.next_word() as usize;
                let args = self.quoted(argc);
                self.line(pc, &format!("  args {argc} {args}"));
            }
        }
    }

    fn instruction(&mut self) {
        let pc = self.cursor.pc();
        let word = self.cursor.next_word();
        let Some(tag) = Tag::of(word) else {
            self.line(pc, &format!("?? {word:#010x}"));
            return;
        };
        let name = tag.mnemonic();
        let text = match tag {
            Tag::End => name.to_string(),
            Tag::List => {
                let kind = code::list_type(word);
                if kind.contains(ListType::SIMPLE) {
                    let line = self.cursor.next_word();
                    format!("{name} {kind:?} skip={} line={line}", code::list_skip(word))
                } else {
                    format!("{name} {kind:?}")
                }
            }
            Tag::Sublist => {
                let kind = code::sublist_type(word);
                let flags = code::sublist_flags(word);
                let skip = code::sublist_skip(word);
                let kind = match kind {
                    SublistType::End => "end",
                    SublistType::And => "and",
                    SublistType::Or => "or",
                };
                if flags.contains(SublistFlags::SIMPLE) {
                    let line = self.cursor.next_word();
                    format!("{name} {kind} {flags:?} skip={skip} line={line}")
                } else {
                    format!("{name} {kind} {flags:?} skip={skip}")
                }
            }
            Tag::Pipe => match code::pipe_type(word) {
                PipeType::End => format!("{name} end line={}", code::pipe_line(word)),
                PipeType::Mid => {
                    let offset = self.cursor.next_word();
                    format!("{name} mid line={} next=+{offset}", code::pipe_line(word))
                }
            },
            Tag::Redir => {
                self.cursor.set_pc(pc);
                match self.cursor.read_redirection() {
                    Some(redir) => {
                        let mut text = format!("{name} {}{} {:?}", redir.fd, redir.kind.operator(), redir.name);
                        if let Some((raw, _)) = &redir.here_terminator {
                            let _ = write!(text, " until {raw:?}");
                        }
                        if let Some(var) = &redir.var_id {
                            let _ = write!(text, " {{{var}}}");
                        }
                        text
                    }
                    None => {
                        self.cursor.set_pc(pc + 1);
                        format!("{name} ?? {word:#010x}")
                    }
                }
            }
            Tag::Assign => {
                let kind = code::assign_type(word);
                let mode = code::assign_mode(word);
                let target = self.cursor.read_string();
                let count = match kind {
                    code::AssignType::Scalar => 1,
                    code::AssignType::Array => code::assign_elements(word) as usize,
                };
                let values = self.quoted(count);
                format!("{name} {kind:?} {mode:?} {target:?} {values}")
            }
            Tag::Simple => {
                let argc = code::data(word) as usize;
                format!("{name} {argc} {}", self.quoted(argc))
            }
            Tag::Typeset => {
                let argc = code::data(word) as usize;
                let args = self.quoted(argc);
                let assigns = self.cursor.next_word();
                format!("{name} {argc} {args} assigns={assigns}")
            }
            Tag::Subsh | Tag::Cursh | Tag::Try => {
                format!("{name} skip={}", code::data(word))
            }
            Tag::Timed => format!("{name} {}", if code::data(word) == 0 { "empty" } else { "pipe" }),
            Tag::Funcdef => self.funcdef(pc, word),
            Tag::For => {
                let skip = code::skip_bits(word, 2);
                match code::type_bits(word, 2) {
                    t if t == ForType::Cond as u32 => {
                        format!("{name} cond skip={skip} {}", self.quoted(3))
                    }
                    t => {
                        let names = self.cursor.next_word() as usize;
                        let vars = self.quoted(names);
                        if t == ForType::List as u32 {
                            let count = self.cursor.next_word() as usize;
                            format!("{name} list skip={skip} {vars} in {}", self.quoted(count))
                        } else {
                            format!("{name} pparam skip={skip} {vars}")
                        }
                    }
                }
            }
            Tag::Select => {
                let skip = code::skip_bits(word, 1);
                let var = self.quoted(1);
                if code::type_bits(word, 1) == 1 {
                    let count = self.cursor.next_word() as usize;
                    format!("{name} list skip={skip} {var} in {}", self.quoted(count))
                } else {
                    format!("{name} pparam skip={skip} {var}")
                }
            }
            Tag::While => {
                let kind = if code::type_bits(word, 1) == 0 { "while" } else { "until" };
                format!("{name} {kind} skip={}", code::skip_bits(word, 1))
            }
            Tag::Repeat => format!("{name} skip={} {}", code::data(word), self.quoted(1)),
            Tag::Case => {
                let skip = code::skip_bits(word, 3);
                match code::type_bits(word, 3) {
                    0 => format!("{name} head skip={skip} {}", self.quoted(1)),
                    kind => {
                        let kind = match kind {
                            1 => ";;",
                            2 => ";&",
                            _ => ";|",
                        };
                        let count = self.cursor.next_word() as usize;
                        let mut patterns = Vec::with_capacity(count);
                        for _ in 0..count {
                            let pattern = self.cursor.read_string();
                            let slot = self.cursor.next_word();
                            patterns.push(format!("{pattern:?}#{slot}"));
                        }
                        format!("{name} {kind} skip={skip} {}", patterns.join(" | "))
                    }
                }
            }
            Tag::If => {
                let kind = match code::type_bits(word, 2) {
                    0 => "head",
                    1 => "if",
                    2 => "elif",
                    _ => "else",
                };
                format!("{name} {kind} skip={}", code::skip_bits(word, 2))
            }
            Tag::Cond => self.condition(word),
            Tag::Arith => format!("{name} {}", self.quoted(1)),
            Tag::Autofn => name.to_string(),
        };
        self.line(pc, &text);
    }

    fn funcdef(&mut self, pc: usize, word: Wordcode) -> String {
        let skip = code::data(word) as usize;
        let count = self.cursor.next_word() as usize;
        let names = self.quoted(count);
        let relative_start = self.cursor.next_word() as usize;
        let strings_len = self.cursor.next_word();
        let patterns = self.cursor.next_word();
        let tracing = self.cursor.next_word();

        let outer = self.cursor.string_base();
        let end = pc + skip;
        self.scopes.push((end, outer));
        self.cursor.set_string_base(outer + relative_start);
        if count == 0 {
            self.trailers.push((end + 1, Trailer::FunctionArgs));
        }
        format!(
            "FUNCDEF skip={skip} {names} strings={relative_start}+{strings_len} patterns={patterns}{}",
            if tracing != 0 { " traced" } else { "" }
        )
    }

    fn condition(&mut self, word: Wordcode) -> String {
        let kind = code::cond_type(word);
        let skip = code::cond_skip(word);
        match kind {
            cond::NOT => "COND !".to_string(),
            cond::AND => format!("COND && skip={skip}"),
            cond::OR => format!("COND || skip={skip}"),
            cond::STREQ | cond::STRDEQ | cond::STRNEQ => {
                let operator = match kind {
                    cond::STREQ => "=",
                    cond::STRDEQ => "==",
                    _ => "!=",
                };
                let operands = self.quoted(2);
                let slot = self.cursor.next_word();
                format!("COND {operator} {operands} #{slot}")
            }
            cond::STRLT => format!("COND < {}", self.quoted(2)),
            cond::STRGTR => format!("COND > {}", self.quoted(2)),
            cond::REGEX => format!("COND =~ {}", self.quoted(2)),
            cond::NT..=cond::GE => {
                let operator = cond::BINARY_OPERATORS[(kind - cond::NT) as usize];
                format!("COND -{operator} {}", self.quoted(2))
            }
            cond::MOD => {
                let operands = self.quoted(skip as usize + 1);
                format!("COND mod {operands}")
            }
            cond::MODI => format!("COND modi {}", self.quoted(3)),
            letter => {
                let letter = char::from_u32(letter).unwrap_or('?');
                format!("COND -{letter} {}", self.quoted(1))
            }
        }
    }
}
