//! Here-document queue and body helper types.

use crate::lexer::cursor::Cursor;

/// Pending here-document specification discovered before line-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingHereDoc {
    pub(crate) raw_delimiter: String,
    pub(crate) delimiter_key: String,
    pub(crate) strip_tabs: bool,
}

impl PendingHereDoc {
    /// Records a pending here-document from its delimiter word.
    pub(crate) fn new(raw_delimiter: &str, strip_tabs: bool) -> Self {
        Self {
            raw_delimiter: raw_delimiter.to_string(),
            delimiter_key: quote_remove_delimiter(raw_delimiter),
            strip_tabs,
        }
    }
}

/// Captured body of one here-document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HereDocument {
    /// Document text, including the final newline of each line.
    pub body: String,
    /// Terminator as written after the operator.
    pub raw_terminator: String,
    /// Terminator with quoting removed.
    pub munged_terminator: String,
    /// Leading tabs were stripped (`<<-`).
    pub strip_tabs: bool,
}

/// Removes quote/backslash syntax and returns the delimiter comparison key.
pub(crate) fn quote_remove_delimiter(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(ch) = chars.next() {
        if in_single {
            if ch == '\'' {
                in_single = false;
            } else {
                out.push(ch);
            }
            continue;
        }
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => in_double = !in_double,
            '\'' if !in_double => in_single = true,
            '$' if !in_double && chars.peek() == Some(&'\'') => {
                chars.next();
                in_single = true;
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Reads the body for `queued` starting at `cursor`, which must sit at the
/// start of a line. Input ending before the delimiter ends the body.
pub(crate) fn read_body(cursor: &mut Cursor, input: &str, queued: PendingHereDoc) -> HereDocument {
    let mut body = String::new();
    while !cursor.is_eof(input) {
        let start = cursor.offset();
        let end = input[start..]
            .find('\n')
            .map_or(input.len(), |index| start + index + 1);
        let line = &input[start..end];
        cursor.seek(end, input);

        let content = line.strip_suffix('\n').unwrap_or(line);
        let stored = if queued.strip_tabs {
            content.trim_start_matches('\t')
        } else {
            content
        };
        if stored == queued.delimiter_key {
            break;
        }
        body.push_str(stored);
        if line.ends_with('\n') {
            body.push('\n');
        }
    }
    HereDocument {
        body,
        raw_terminator: queued.raw_delimiter,
        munged_terminator: queued.delimiter_key,
        strip_tabs: queued.strip_tabs,
    }
}
