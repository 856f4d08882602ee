//! Operator scanning helpers for longest-match tokenization.

use crate::lexer::token::TokenKind;
use crate::wordcode::code::RedirKind;

/// Operators in longest-match order.
const OPERATORS: &[(&str, TokenKind)] = &[
    (">>&|", TokenKind::Redir(RedirKind::ErrAppendNow)),
    ("&>>|", TokenKind::Redir(RedirKind::ErrAppendNow)),
    ("<<<", TokenKind::Redir(RedirKind::HereString)),
    ("<<-", TokenKind::Redir(RedirKind::HereDocDash)),
    (">>|", TokenKind::Redir(RedirKind::AppendNow)),
    (">>!", TokenKind::Redir(RedirKind::AppendNow)),
    (">>&", TokenKind::Redir(RedirKind::ErrAppend)),
    ("&>>", TokenKind::Redir(RedirKind::ErrAppend)),
    (">&|", TokenKind::Redir(RedirKind::ErrWriteNow)),
    (">&!", TokenKind::Redir(RedirKind::ErrWriteNow)),
    ("&>|", TokenKind::Redir(RedirKind::ErrWriteNow)),
    ("&>!", TokenKind::Redir(RedirKind::ErrWriteNow)),
    ("<<", TokenKind::Redir(RedirKind::HereDoc)),
    (">>", TokenKind::Redir(RedirKind::Append)),
    (">|", TokenKind::Redir(RedirKind::WriteNow)),
    (">!", TokenKind::Redir(RedirKind::WriteNow)),
    ("<>", TokenKind::Redir(RedirKind::ReadWrite)),
    ("<&", TokenKind::Redir(RedirKind::MergeIn)),
    (">&", TokenKind::Redir(RedirKind::MergeOut)),
    ("&>", TokenKind::Redir(RedirKind::ErrWrite)),
    (";;", TokenKind::Dsemi),
    (";&", TokenKind::SemiAmp),
    (";|", TokenKind::SemiBar),
    ("&&", TokenKind::Damper),
    ("&!", TokenKind::AmperBang),
    ("&|", TokenKind::AmperBang),
    ("||", TokenKind::Dbar),
    ("|&", TokenKind::BarAmp),
    ("()", TokenKind::InOutPar),
    (">", TokenKind::Redir(RedirKind::Write)),
    ("<", TokenKind::Redir(RedirKind::Read)),
    (";", TokenKind::Seper),
    ("&", TokenKind::Amper),
    ("|", TokenKind::Bar),
    ("(", TokenKind::InPar),
    (")", TokenKind::OutPar),
];

/// Matches an operator at the start of `tail`, longest first.
pub(crate) fn match_operator(tail: &[u8]) -> Option<(TokenKind, &'static str)> {
    OPERATORS
        .iter()
        .find(|(text, _)| tail.starts_with(text.as_bytes()))
        .map(|&(text, kind)| (kind, text))
}

/// Returns `true` for bytes that end an unquoted word.
pub(crate) fn is_word_break(byte: u8) -> bool {
    matches!(
        byte,
        b' ' | b'\t' | b'\n' | b';' | b'&' | b'|' | b'<' | b'>' | b'(' | b')'
    )
}
