//! Parser for the `.properties` text format
//!
//! Supports:
//! - `key=value`, `key: value` and `key value` separators
//! - `#` and `!` comment lines
//! - line continuations with a trailing backslash
//! - escapes: `\t`, `\n`, `\r`, `\f`, `\uXXXX`, and `\x` for any other `x`

/// A syntax error in properties text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct PropertiesSyntaxError {
    /// 1-based line where the offending logical line starts
    pub line: usize,
    pub message: String,
}

/// Parse properties text into `(key, value)` pairs in file order.
///
/// Duplicate keys are returned as they appear; the later entry wins when
/// the entries are merged.
pub fn parse(input: &str) -> Result<Vec<(String, String)>, PropertiesSyntaxError> {
    let mut entries = Vec::new();

    for (line, logical) in LogicalLines::new(input) {
        let (key, value) = split_key_value(&logical);
        let key = unescape(key).map_err(|message| PropertiesSyntaxError { line, message })?;
        let value = unescape(value).map_err(|message| PropertiesSyntaxError { line, message })?;
        entries.push((key, value));
    }

    Ok(entries)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\u{c}'
}

/// Iterator over logical lines: comments and blank lines dropped,
/// continuations joined. Yields the starting line number with each line.
struct LogicalLines<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> LogicalLines<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate(),
        }
    }
}

impl Iterator for LogicalLines<'_> {
    type Item = (usize, String);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, natural) = self.lines.next()?;
            let natural = natural.trim_end_matches('\r').trim_start_matches(is_blank);

            if natural.is_empty() || natural.starts_with('#') || natural.starts_with('!') {
                continue;
            }

            let mut logical = String::new();
            let mut current = natural;
            loop {
                if !ends_with_continuation(current) {
                    logical.push_str(current);
                    break;
                }
                logical.push_str(&current[..current.len() - 1]);
                match self.lines.next() {
                    Some((_, next)) => {
                        current = next.trim_end_matches('\r').trim_start_matches(is_blank);
                    }
                    None => break,
                }
            }

            return Some((index + 1, logical));
        }
    }
}

/// A line continues when it ends with an odd number of backslashes
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=`, `:` or whitespace
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    let mut separator = None;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                separator = Some(c);
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                separator = Some(c);
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = match separator {
        Some(c) => &line[key_end + c.len_utf8()..],
        None => "",
    };

    if matches!(separator, Some(c) if is_blank(c)) {
        rest = rest.trim_start_matches(is_blank);
        if let Some(stripped) = rest.strip_prefix(['=', ':']) {
            rest = stripped;
        }
    }

    (key, rest.trim_start_matches(is_blank))
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => result.push('\t'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('f') => result.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("Malformed \\uxxxx escape: \\u{}", hex))?;
                result.push(code);
            }
            Some(other) => result.push(other),
            None => {}
        }
    }

    Ok(result)
}

/// Write `(key, value)` pairs as properties text, one entry per line.
///
/// Keys and values are escaped so that [`parse`] reads back the same pairs.
pub fn write<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        escape_into(key, true, &mut out);
        out.push('=');
        escape_into(value, false, &mut out);
        out.push('\n');
    }
    out
}

fn escape_into(text: &str, is_key: bool, out: &mut String) {
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            // Leading blanks of a value would be dropped by the parser
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}
