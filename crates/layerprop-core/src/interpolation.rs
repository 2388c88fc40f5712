//! Placeholder parsing
//!
//! Parses property values containing placeholders like:
//! - `${key}` - lookup of another key
//! - `${key:default}` - lookup with a fallback
//! - `${${inner}}` - nested placeholder; `inner` is resolved first and its
//!   value becomes the outer key
//!
//! Delimiters and the default separator are configurable through [`Syntax`].
//! A start delimiter without a matching end delimiter is plain text.
//!
//! Expanded text is parsed again when it is rescanned. Spans that came from
//! non-resolvable values are carried in [`Text::verbatim`] and parse as
//! [`Segment::Verbatim`], so delimiters inside them never match.

use std::ops::Range;

use crate::error::{Error, Result};

/// Placeholder delimiters and default separator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub start: String,
    pub end: String,
    /// Separates the key from its default value. Empty disables defaults.
    pub default_separator: String,
}

impl Default for Syntax {
    fn default() -> Self {
        Self {
            start: "${".to_string(),
            end: "}".to_string(),
            default_separator: ":".to_string(),
        }
    }
}

impl Syntax {
    /// Create a syntax with custom delimiters and separator
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        default_separator: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            default_separator: default_separator.into(),
        }
    }

    /// Check that both delimiters are usable
    pub fn validate(&self) -> Result<()> {
        if self.start.is_empty() {
            return Err(Error::invalid_options("Start delimiter must not be empty")
                .with_key("start_delimiter"));
        }
        if self.end.is_empty() {
            return Err(
                Error::invalid_options("End delimiter must not be empty").with_key("end_delimiter")
            );
        }
        Ok(())
    }

    /// Render a placeholder back to text from its expanded key and its
    /// default exactly as parsed
    pub fn render(&self, key: &Text, default: Option<&[Segment]>) -> Text {
        let mut text = Text::plain(self.start.as_str());
        text.append(key);
        if let Some(default) = default {
            text.push_str(&self.default_separator);
            text.append(&self.render_segments(default));
        }
        text.push_str(&self.end);
        text
    }

    /// Render parsed segments back to the text they were parsed from
    pub fn render_segments(&self, segments: &[Segment]) -> Text {
        let mut text = Text::default();
        for segment in segments {
            match segment {
                Segment::Literal(s) => text.push_str(s),
                Segment::Verbatim(s) => text.push_verbatim(s),
                Segment::Placeholder(placeholder) => {
                    let key = self.render_segments(&placeholder.key);
                    text.append(&self.render(&key, placeholder.default.as_deref()));
                }
            }
        }
        text
    }
}

/// Text produced by expansion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Text {
    pub value: String,
    /// Byte ranges of `value` copied from non-resolvable values, in order
    pub verbatim: Vec<Range<usize>>,
}

impl Text {
    /// Text with no verbatim spans
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            verbatim: Vec::new(),
        }
    }

    /// Text that is verbatim as a whole
    pub fn verbatim(value: impl Into<String>) -> Self {
        let mut text = Self::default();
        text.push_verbatim(&value.into());
        text
    }

    pub fn push_str(&mut self, s: &str) {
        self.value.push_str(s);
    }

    pub fn push_verbatim(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        let start = self.value.len();
        self.value.push_str(s);
        self.verbatim.push(start..self.value.len());
    }

    pub fn append(&mut self, other: &Text) {
        let offset = self.value.len();
        self.value.push_str(&other.value);
        self.verbatim.extend(
            other
                .verbatim
                .iter()
                .map(|r| r.start + offset..r.end + offset),
        );
    }
}

/// A parsed property value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    /// Check if the value contains at least one placeholder
    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(_)))
    }
}

/// A piece of a parsed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain text
    Literal(String),
    /// Text from a non-resolvable value, never parsed
    Verbatim(String),
    /// A `start key [sep default] end` placeholder
    Placeholder(Placeholder),
}

/// A placeholder expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Segments forming the lookup key (may contain nested placeholders)
    pub key: Vec<Segment>,
    /// Fallback used when the key is not defined
    pub default: Option<Vec<Segment>>,
}

/// Parser for placeholder expressions
pub struct PlaceholderParser<'a> {
    input: &'a str,
    pos: usize,
    syntax: &'a Syntax,
    verbatim: &'a [Range<usize>],
}

impl<'a> PlaceholderParser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str, syntax: &'a Syntax) -> Self {
        Self {
            input,
            pos: 0,
            syntax,
            verbatim: &[],
        }
    }

    /// Create a parser that keeps the verbatim spans of `text` opaque
    pub fn for_text(text: &'a Text, syntax: &'a Syntax) -> Self {
        Self {
            input: &text.value,
            pos: 0,
            syntax,
            verbatim: &text.verbatim,
        }
    }

    /// Parse the entire input string
    pub fn parse(&mut self) -> Template {
        let mut segments = Vec::new();
        let mut literal = String::new();

        while !self.is_eof() {
            if let Some(end) = self.verbatim_end() {
                flush_literal(&mut literal, &mut segments);
                segments.push(self.take_verbatim(end));
            } else if self.at(&self.syntax.start) {
                let start = self.pos;
                match self.parse_placeholder() {
                    Some(placeholder) => {
                        flush_literal(&mut literal, &mut segments);
                        segments.push(Segment::Placeholder(placeholder));
                    }
                    None => {
                        // Unterminated: the delimiter is plain text
                        self.pos = start + self.syntax.start.len();
                        literal.push_str(&self.syntax.start);
                    }
                }
            } else {
                self.take_char(&mut literal);
            }
        }

        flush_literal(&mut literal, &mut segments);
        Template { segments }
    }

    /// Check if we're at end of input
    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Check if the remaining input starts with `token` outside any
    /// verbatim span
    fn at(&self, token: &str) -> bool {
        let end = self.pos + token.len();
        !token.is_empty()
            && self.input[self.pos..].starts_with(token)
            && !self
                .verbatim
                .iter()
                .any(|r| r.start < end && r.end > self.pos)
    }

    /// End of the verbatim span starting at the current position
    fn verbatim_end(&self) -> Option<usize> {
        self.verbatim
            .iter()
            .find(|r| r.start == self.pos)
            .map(|r| r.end)
    }

    fn take_verbatim(&mut self, end: usize) -> Segment {
        let text = self.input[self.pos..end].to_string();
        self.pos = end;
        Segment::Verbatim(text)
    }

    /// Move the current character into `buf`
    fn take_char(&mut self, buf: &mut String) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            buf.push(c);
            self.pos += c.len_utf8();
        }
    }

    /// Parse a placeholder starting at the start delimiter.
    ///
    /// Returns `None` when input ends before the matching end delimiter.
    fn parse_placeholder(&mut self) -> Option<Placeholder> {
        self.pos += self.syntax.start.len();

        let mut key = Vec::new();
        let mut default: Option<Vec<Segment>> = None;
        let mut literal = String::new();

        loop {
            if self.is_eof() {
                return None;
            }

            if let Some(end) = self.verbatim_end() {
                let target = match &mut default {
                    Some(segments) => segments,
                    None => &mut key,
                };
                flush_literal(&mut literal, target);
                target.push(self.take_verbatim(end));
                continue;
            }

            // End is tested first so identical start/end delimiters still close
            if self.at(&self.syntax.end) {
                self.pos += self.syntax.end.len();

                let target = match &mut default {
                    Some(segments) => segments,
                    None => &mut key,
                };
                flush_literal(&mut literal, target);
                return Some(Placeholder { key, default });
            }

            if self.at(&self.syntax.start) {
                let nested = self.parse_placeholder()?;
                let target = match &mut default {
                    Some(segments) => segments,
                    None => &mut key,
                };
                flush_literal(&mut literal, target);
                target.push(Segment::Placeholder(nested));
                continue;
            }

            if default.is_none() && self.at(&self.syntax.default_separator) {
                flush_literal(&mut literal, &mut key);
                self.pos += self.syntax.default_separator.len();
                default = Some(Vec::new());
                continue;
            }

            self.take_char(&mut literal);
        }
    }
}

fn flush_literal(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

/// Parse a property value
pub fn parse(input: &str, syntax: &Syntax) -> Template {
    PlaceholderParser::new(input, syntax).parse()
}

/// Parse expanded text, keeping its verbatim spans opaque
pub fn parse_text(text: &Text, syntax: &Syntax) -> Template {
    PlaceholderParser::for_text(text, syntax).parse()
}

/// Quick check whether a value may contain a placeholder: a start delimiter
/// followed somewhere by an end delimiter
pub fn contains_placeholder(input: &str, syntax: &Syntax) -> bool {
    input
        .find(syntax.start.as_str())
        .is_some_and(|i| input[i + syntax.start.len()..].contains(syntax.end.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(s: &str) -> Segment {
        Segment::Literal(s.into())
    }

    fn key(segments: Vec<Segment>) -> Segment {
        Segment::Placeholder(Placeholder {
            key: segments,
            default: None,
        })
    }

    fn with_default(segments: Vec<Segment>, default: Vec<Segment>) -> Segment {
        Segment::Placeholder(Placeholder {
            key: segments,
            default: Some(default),
        })
    }

    fn parse_default(input: &str) -> Vec<Segment> {
        parse(input, &Syntax::default()).segments
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_default("hello world"), vec![lit("hello world")]);
        assert!(!parse("hello", &Syntax::default()).has_placeholders());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_default(""), vec![]);
    }

    #[test]
    fn test_parse_simple_placeholder() {
        assert_eq!(parse_default("${db.host}"), vec![key(vec![lit("db.host")])]);
    }

    #[test]
    fn test_parse_concatenation() {
        assert_eq!(
            parse_default("jdbc://${host}:${port}/db"),
            vec![
                lit("jdbc://"),
                key(vec![lit("host")]),
                lit(":"),
                key(vec![lit("port")]),
                lit("/db"),
            ]
        );
    }

    #[test]
    fn test_parse_nested_placeholder() {
        assert_eq!(
            parse_default("${${key3}}__${key1}"),
            vec![
                key(vec![key(vec![lit("key3")])]),
                lit("__"),
                key(vec![lit("key1")]),
            ]
        );
    }

    #[test]
    fn test_parse_partially_nested_key() {
        assert_eq!(
            parse_default("${db.${env}.host}"),
            vec![key(vec![lit("db."), key(vec![lit("env")]), lit(".host")])]
        );
    }

    #[test]
    fn test_parse_default_value() {
        assert_eq!(
            parse_default("${keyX:fallback}"),
            vec![with_default(vec![lit("keyX")], vec![lit("fallback")])]
        );
    }

    #[test]
    fn test_parse_default_splits_on_first_separator() {
        assert_eq!(
            parse_default("${url:http://localhost}"),
            vec![with_default(vec![lit("url")], vec![lit("http://localhost")])]
        );
    }

    #[test]
    fn test_parse_empty_default() {
        assert_eq!(
            parse_default("${key:}"),
            vec![with_default(vec![lit("key")], vec![])]
        );
    }

    #[test]
    fn test_parse_default_with_nested_placeholder() {
        assert_eq!(
            parse_default("${a:${b}}"),
            vec![with_default(vec![lit("a")], vec![key(vec![lit("b")])])]
        );
    }

    #[test]
    fn test_parse_separator_inside_nested_key_belongs_to_nested() {
        assert_eq!(
            parse_default("${${a:b}}"),
            vec![key(vec![with_default(vec![lit("a")], vec![lit("b")])])]
        );
    }

    #[test]
    fn test_parse_unterminated_is_literal() {
        assert_eq!(parse_default("${unclosed"), vec![lit("${unclosed")]);
        assert_eq!(
            parse_default("${outer ${inner}"),
            vec![lit("${outer "), key(vec![lit("inner")])]
        );
    }

    #[test]
    fn test_parse_stray_end_delimiter_is_literal() {
        assert_eq!(
            parse_default("a}b${c}}"),
            vec![lit("a}b"), key(vec![lit("c")]), lit("}")]
        );
    }

    #[test]
    fn test_parse_custom_delimiters() {
        let syntax = Syntax::new("((", "))", ":");
        assert_eq!(
            parse("((a)) and ${b}", &syntax).segments,
            vec![key(vec![lit("a")]), lit(" and ${b}")]
        );
    }

    #[test]
    fn test_parse_identical_delimiters() {
        let syntax = Syntax::new("%", "%", ":");
        assert_eq!(
            parse("%a%-%b%", &syntax).segments,
            vec![key(vec![lit("a")]), lit("-"), key(vec![lit("b")])]
        );
    }

    #[test]
    fn test_parse_empty_separator_disables_defaults() {
        let syntax = Syntax::new("${", "}", "");
        assert_eq!(parse("${a:b}", &syntax).segments, vec![key(vec![lit("a:b")])]);
    }

    #[test]
    fn test_parse_multichar_separator() {
        let syntax = Syntax::new("${", "}", ":-");
        assert_eq!(
            parse("${a:b:-c}", &syntax).segments,
            vec![with_default(vec![lit("a:b")], vec![lit("c")])]
        );
    }

    #[test]
    fn test_parse_multibyte_text() {
        assert_eq!(
            parse_default("héllo ${clé} ✓"),
            vec![lit("héllo "), key(vec![lit("clé")]), lit(" ✓")]
        );
    }

    #[test]
    fn test_render() {
        let syntax = Syntax::default();
        assert_eq!(syntax.render(&Text::plain("key1"), None).value, "${key1}");
        assert_eq!(
            syntax.render(&Text::plain("a"), Some(&[lit("b")][..])).value,
            "${a:b}"
        );
        assert_eq!(
            Syntax::new("((", "))", "|")
                .render(&Text::plain("a"), Some(&[][..]))
                .value,
            "((a|))"
        );
    }

    #[test]
    fn test_render_segments_reproduces_input() {
        let syntax = Syntax::default();
        for input in ["${x:${y}}", "a ${b:c:d} ${${e}}", "${unclosed", "${k:}"] {
            assert_eq!(syntax.render_segments(&parse_default(input)).value, input);
        }
    }

    #[test]
    fn test_render_keeps_verbatim_spans() {
        let syntax = Syntax::default();
        let rendered = syntax.render(&Text::verbatim("${env}"), Some(&[lit("d")][..]));
        assert_eq!(rendered.value, "${${env}:d}");
        assert_eq!(rendered.verbatim, vec![2..8]);
    }

    #[test]
    fn test_parse_text_keeps_verbatim_opaque() {
        let mut text = Text::plain("a=");
        text.push_verbatim("${not.me}");
        text.push_str(" ${b}");
        assert_eq!(
            parse_text(&text, &Syntax::default()).segments,
            vec![
                lit("a="),
                Segment::Verbatim("${not.me}".into()),
                lit(" "),
                key(vec![lit("b")]),
            ]
        );
    }

    #[test]
    fn test_parse_text_delimiters_never_straddle_verbatim() {
        // "$" + verbatim "{x}" must not form a start delimiter
        let mut text = Text::plain("$");
        text.push_verbatim("{x}");
        assert_eq!(
            parse_text(&text, &Syntax::default()).segments,
            vec![lit("$"), Segment::Verbatim("{x}".into())]
        );
    }

    #[test]
    fn test_parse_text_verbatim_inside_placeholder_key() {
        let mut text = Text::plain("${db.");
        text.push_verbatim("prod");
        text.push_str("}");
        assert_eq!(
            parse_text(&text, &Syntax::default()).segments,
            vec![key(vec![lit("db."), Segment::Verbatim("prod".into())])]
        );
    }

    #[test]
    fn test_text_append_offsets_spans() {
        let mut text = Text::plain("ab");
        text.append(&Text::verbatim("cd"));
        text.push_verbatim("");
        assert_eq!(text.value, "abcd");
        assert_eq!(text.verbatim, vec![2..4]);
    }

    #[test]
    fn test_contains_placeholder() {
        let syntax = Syntax::default();
        assert!(contains_placeholder("${a}", &syntax));
        assert!(contains_placeholder("x ${a} y", &syntax));
        assert!(!contains_placeholder("no placeholder", &syntax));
        assert!(!contains_placeholder("} before ${", &syntax));
        assert!(!contains_placeholder("just $dollar", &syntax));
    }

    #[test]
    fn test_validate_rejects_empty_delimiters() {
        assert!(Syntax::default().validate().is_ok());
        assert!(Syntax::new("", "}", ":").validate().is_err());
        let err = Syntax::new("${", "", ":").validate().unwrap_err();
        assert_eq!(err.key.as_deref(), Some("end_delimiter"));
    }
}
