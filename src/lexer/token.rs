//! Token model shared by token sources and the compiler.

use crate::wordcode::code::RedirKind;

/// Lexical token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of a `test` argument vector.
    NullTok,
    /// `;` or newline.
    Seper,
    /// `;;`
    Dsemi,
    /// `;&`
    SemiAmp,
    /// `;|`
    SemiBar,
    /// `&`
    Amper,
    /// `&!` or `&|`
    AmperBang,
    /// `(`
    InPar,
    /// `)`
    OutPar,
    /// `()`
    InOutPar,
    /// `||`
    Dbar,
    /// `&&`
    Damper,
    /// `|`
    Bar,
    /// `|&`
    BarAmp,
    /// `((` or one `;`-separated part of an arithmetic `for` head.
    DinPar,
    /// Final part of an arithmetic `for` head, up to `))`.
    DoutPar,
    /// `]]`
    DoutBrack,
    /// Redirection operator. The token's `fd` holds a leading descriptor.
    Redir(RedirKind),
    /// Ordinary word.
    String,
    /// `name=value` or `name+=value` assignment word.
    EnvString,
    /// `name=(` or `name+=(` array assignment opener; text is the name.
    EnvArray,
    /// End of input.
    EndInput,
    /// Lexical error; text describes it.
    LexErr,
    /// `!`
    Bang,
    /// `[[`
    DinBrack,
    /// `{`
    InBrace,
    /// `}`
    OutBrace,
    /// `case`
    Case,
    /// `coproc`
    Coproc,
    /// `do`
    DoLoop,
    /// `done`
    Done,
    /// `elif`
    Elif,
    /// `else`
    Else,
    /// `end`
    ZEnd,
    /// `esac`
    Esac,
    /// `fi`
    Fi,
    /// `for`
    For,
    /// `foreach`
    Foreach,
    /// `function`
    Func,
    /// `if`
    If,
    /// `nocorrect`
    NoCorrect,
    /// `repeat`
    Repeat,
    /// `select`
    Select,
    /// `then`
    Then,
    /// `time`
    Time,
    /// `until`
    Until,
    /// `while`
    While,
    /// `typeset` and the other declaration builtins.
    Typeset,
}

impl TokenKind {
    /// Returns `true` for redirection operators.
    pub fn is_redirection(self) -> bool {
        matches!(self, Self::Redir(_))
    }

    /// Text shown for this token in error messages when it has no lexeme.
    pub fn describe(self) -> &'static str {
        match self {
            Self::NullTok => "",
            Self::Seper => ";",
            Self::Dsemi => ";;",
            Self::SemiAmp => ";&",
            Self::SemiBar => ";|",
            Self::Amper => "&",
            Self::AmperBang => "&!",
            Self::InPar => "(",
            Self::OutPar => ")",
            Self::InOutPar => "()",
            Self::Dbar => "||",
            Self::Damper => "&&",
            Self::Bar => "|",
            Self::BarAmp => "|&",
            Self::DinPar => "((",
            Self::DoutPar => "))",
            Self::DoutBrack => "]]",
            Self::Redir(kind) => kind.operator(),
            Self::String | Self::EnvString | Self::EnvArray => "word",
            Self::EndInput => "end of input",
            Self::LexErr => "lexical error",
            Self::Bang => "!",
            Self::DinBrack => "[[",
            Self::InBrace => "{",
            Self::OutBrace => "}",
            Self::Case => "case",
            Self::Coproc => "coproc",
            Self::DoLoop => "do",
            Self::Done => "done",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::ZEnd => "end",
            Self::Esac => "esac",
            Self::Fi => "fi",
            Self::For => "for",
            Self::Foreach => "foreach",
            Self::Func => "function",
            Self::If => "if",
            Self::NoCorrect => "nocorrect",
            Self::Repeat => "repeat",
            Self::Select => "select",
            Self::Then => "then",
            Self::Time => "time",
            Self::Until => "until",
            Self::While => "while",
            Self::Typeset => "typeset",
        }
    }
}

/// Looks up a reserved word recognised in command position.
pub fn reserved_word(text: &str) -> Option<TokenKind> {
    Some(match text {
        "!" => TokenKind::Bang,
        "[[" => TokenKind::DinBrack,
        "{" => TokenKind::InBrace,
        "}" => TokenKind::OutBrace,
        "case" => TokenKind::Case,
        "coproc" => TokenKind::Coproc,
        "do" => TokenKind::DoLoop,
        "done" => TokenKind::Done,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "end" => TokenKind::ZEnd,
        "esac" => TokenKind::Esac,
        "fi" => TokenKind::Fi,
        "for" => TokenKind::For,
        "foreach" => TokenKind::Foreach,
        "function" => TokenKind::Func,
        "if" => TokenKind::If,
        "nocorrect" => TokenKind::NoCorrect,
        "repeat" => TokenKind::Repeat,
        "select" => TokenKind::Select,
        "then" => TokenKind::Then,
        "time" => TokenKind::Time,
        "until" => TokenKind::Until,
        "while" => TokenKind::While,
        "typeset" | "declare" | "export" | "float" | "integer" | "local" | "readonly" => {
            TokenKind::Typeset
        }
        _ => return None,
    })
}

/// One token with its text and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token category.
    pub kind: TokenKind,
    /// Source text (word text, assignment text, arithmetic text).
    pub text: String,
    /// Explicit descriptor number before a redirection operator.
    pub fd: Option<u32>,
    /// Source line, starting at 1.
    pub line: u32,
    /// Set on a [`TokenKind::Seper`] produced by a newline.
    pub newline: bool,
}

impl Token {
    /// Creates a token with no descriptor.
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            fd: None,
            line,
            newline: false,
        }
    }

    /// Text to cite in error messages.
    pub fn display_text(&self) -> String {
        if self.newline {
            return "\\n".to_string();
        }
        match self.kind {
            TokenKind::String | TokenKind::EnvString | TokenKind::LexErr => self.text.clone(),
            TokenKind::EnvArray => format!("{}=(", self.text),
            kind => kind.describe().to_string(),
        }
    }
}
