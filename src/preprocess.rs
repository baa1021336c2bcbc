//! Escapes tags the config does not allow before the markup reaches the parser.
//!
//! The scanner only finds token boundaries. It keeps the original source of every token so
//! that allowed markup passes through byte for byte.

use html5ever::LocalName;
use tracing::trace;

use crate::config::SanitizerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    StartTag,
    EndTag,
    SelfClosingTag,
    Comment,
    Doctype,
    /// Input ended inside a tag, comment or doctype that never closed.
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub raw: &'a str,
    /// Lowercased tag name for start, end and self-closing tags.
    pub name: Option<String>,
}

/// Elements whose contents the parser reads as text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "plaintext", "script", "style", "textarea", "title", "xmp",
];

fn is_html_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0c' | b'\r')
}

pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    raw_text: Option<String>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Scanner {
            input,
            pos: 0,
            raw_text: None,
        }
    }

    /// Reads everything up to `</name` as a single text token next. Called by the consumer after
    /// it let a raw text element's start tag through.
    pub fn enter_raw_text(&mut self, name: &str) {
        if RAW_TEXT_ELEMENTS.contains(&name) {
            self.raw_text = Some(name.to_owned());
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn emit(&mut self, kind: TokenKind, end: usize, name: Option<String>) -> Token<'a> {
        let raw = &self.input[self.pos..end];
        self.pos = end;
        Token { kind, raw, name }
    }

    fn starts_markup(&self, at: usize) -> bool {
        let bytes = self.bytes();
        if bytes[at] != b'<' || at + 1 >= bytes.len() {
            return false;
        }
        let next = bytes[at + 1];
        next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?')
    }

    fn raw_text_end(&self, name: &str) -> usize {
        let bytes = self.bytes();
        let mut at = self.pos;
        while at < bytes.len() {
            if bytes[at] == b'<' && bytes.get(at + 1) == Some(&b'/') {
                let name_end = at + 2 + name.len();
                let closes = bytes.len() >= name_end
                    && bytes[at + 2..name_end].eq_ignore_ascii_case(name.as_bytes())
                    && bytes
                        .get(name_end)
                        .map_or(true, |&b| is_html_whitespace(b) || b == b'/' || b == b'>');
                if closes {
                    return at;
                }
            }
            at += 1;
        }
        bytes.len()
    }

    fn find_from(&self, from: usize, needle: &str) -> Option<usize> {
        self.input[from..].find(needle).map(|offset| from + offset)
    }

    fn scan_comment(&mut self) -> Token<'a> {
        let bytes = self.bytes();
        let body = self.pos + 4;
        // `<!-->` and `<!--->` close immediately.
        if bytes.get(body) == Some(&b'>') {
            return self.emit(TokenKind::Comment, body + 1, None);
        }
        if bytes.get(body) == Some(&b'-') && bytes.get(body + 1) == Some(&b'>') {
            return self.emit(TokenKind::Comment, body + 2, None);
        }
        let close = self.find_from(body, "-->").map(|at| at + 3);
        let bang_close = self.find_from(body, "--!>").map(|at| at + 4);
        match (close, bang_close) {
            (Some(a), Some(b)) => self.emit(TokenKind::Comment, a.min(b), None),
            (Some(end), None) | (None, Some(end)) => self.emit(TokenKind::Comment, end, None),
            (None, None) => {
                let end = self.input.len();
                self.emit(TokenKind::Truncated, end, None)
            }
        }
    }

    /// Bogus comments and doctypes run to the next `>`.
    fn scan_to_gt(&mut self, kind: TokenKind) -> Token<'a> {
        match self.find_from(self.pos + 2, ">") {
            Some(at) => self.emit(kind, at + 1, None),
            None => {
                let end = self.input.len();
                self.emit(TokenKind::Truncated, end, None)
            }
        }
    }

    fn scan_tag(&mut self, name_start: usize, end_tag: bool) -> Token<'a> {
        let bytes = self.bytes();
        let mut at = name_start;
        while at < bytes.len() && !is_html_whitespace(bytes[at]) && !matches!(bytes[at], b'/' | b'>')
        {
            at += 1;
        }
        let name = self.input[name_start..at].to_ascii_lowercase();

        // `=` only starts a value after an attribute name; otherwise it begins a name.
        let mut pending_name = false;
        let mut expect_value = false;
        let mut solidus = false;
        while at < bytes.len() {
            match bytes[at] {
                b'>' => {
                    let kind = if end_tag {
                        TokenKind::EndTag
                    } else if solidus {
                        TokenKind::SelfClosingTag
                    } else {
                        TokenKind::StartTag
                    };
                    return self.emit(kind, at + 1, Some(name));
                }
                b if is_html_whitespace(b) => at += 1,
                b'=' if pending_name && !expect_value => {
                    pending_name = false;
                    expect_value = true;
                    solidus = false;
                    at += 1;
                }
                quote @ b'"' | quote @ b'\'' if expect_value => {
                    match bytes[at + 1..].iter().position(|&b| b == quote) {
                        Some(offset) => at += offset + 2,
                        None => break,
                    }
                    expect_value = false;
                }
                _ if expect_value => {
                    while at < bytes.len() && !is_html_whitespace(bytes[at]) && bytes[at] != b'>'
                    {
                        at += 1;
                    }
                    expect_value = false;
                }
                b'/' => {
                    pending_name = false;
                    solidus = true;
                    at += 1;
                }
                _ => {
                    pending_name = true;
                    solidus = false;
                    at += 1;
                }
            }
        }

        let end = self.input.len();
        self.emit(TokenKind::Truncated, end, Some(name))
    }

    fn scan_markup(&mut self) -> Token<'a> {
        let bytes = self.bytes();
        let rest = &bytes[self.pos..];
        match rest[1] {
            b'!' if rest.starts_with(b"<!--") => self.scan_comment(),
            b'!' if rest.len() >= 9 && rest[2..9].eq_ignore_ascii_case(b"doctype") => {
                self.scan_to_gt(TokenKind::Doctype)
            }
            b'!' | b'?' => self.scan_to_gt(TokenKind::Comment),
            b'/' => match rest.get(2) {
                Some(b) if b.is_ascii_alphabetic() => self.scan_tag(self.pos + 2, true),
                Some(_) => self.scan_to_gt(TokenKind::Comment),
                None => {
                    let end = self.input.len();
                    self.emit(TokenKind::Truncated, end, None)
                }
            },
            _ => self.scan_tag(self.pos + 1, false),
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.input.len() {
            return None;
        }

        if let Some(name) = self.raw_text.take() {
            let end = self.raw_text_end(&name);
            if end > self.pos {
                return Some(self.emit(TokenKind::Text, end, None));
            }
        }

        if self.starts_markup(self.pos) {
            return Some(self.scan_markup());
        }

        let mut end = self.pos + 1;
        while end < self.input.len() && !self.starts_markup(end) {
            end += 1;
        }
        Some(self.emit(TokenKind::Text, end, None))
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn well_formed_comment(raw: &str) -> bool {
    raw.starts_with("<!--") && raw.ends_with("-->")
}

/// Rewrites every tag not allowed by `config` into escaped text. Allowed tags and text keep
/// their exact source. Never fails; anything the scanner can't classify is escaped.
pub fn preprocess(config: &SanitizerConfig, input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut scanner = Scanner::new(input);

    while let Some(token) = scanner.next() {
        match token.kind {
            TokenKind::Text => output.push_str(token.raw),
            TokenKind::StartTag | TokenKind::EndTag | TokenKind::SelfClosingTag => {
                let name = token.name.as_deref().unwrap_or_default();
                if config.allows_element(&LocalName::from(name)) {
                    output.push_str(token.raw);
                    if token.kind == TokenKind::StartTag {
                        scanner.enter_raw_text(name);
                    }
                } else {
                    trace!(tag = name, "escaping disallowed tag");
                    output.push_str(&escape_html(token.raw));
                }
            }
            TokenKind::Comment if !config.escape_comments && well_formed_comment(token.raw) => {
                output.push_str(token.raw)
            }
            TokenKind::Comment | TokenKind::Doctype | TokenKind::Truncated => {
                trace!(kind = ?token.kind, "escaping markup");
                output.push_str(&escape_html(token.raw));
            }
        }
    }

    output
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::config::{DEFAULT_CONFIG, RESTRICTED_CONFIG};

    fn kinds(input: &str) -> Vec<(TokenKind, &str)> {
        Scanner::new(input).map(|token| (token.kind, token.raw)).collect()
    }

    #[test]
    fn scans_tags_and_text() {
        assert_eq!(
            kinds("a<b class=x>c</b><br/>"),
            vec![
                (TokenKind::Text, "a"),
                (TokenKind::StartTag, "<b class=x>"),
                (TokenKind::Text, "c"),
                (TokenKind::EndTag, "</b>"),
                (TokenKind::SelfClosingTag, "<br/>"),
            ]
        );
    }

    #[test]
    fn tag_names_are_lowercased() {
        let token = Scanner::new("<SCRIPT src=x>").next().unwrap();
        assert_eq!(token.name.as_deref(), Some("script"));
    }

    #[test]
    fn quoted_values_may_contain_gt() {
        assert_eq!(
            kinds(r#"<b title="a>b" data-x='>'>"#),
            vec![(TokenKind::StartTag, r#"<b title="a>b" data-x='>'>"#)]
        );
    }

    #[test]
    fn equals_without_a_name_starts_a_name() {
        assert_eq!(
            kinds(r#"<b ="x>"y"#),
            vec![(TokenKind::StartTag, r#"<b ="x>"#), (TokenKind::Text, r#""y"#)]
        );
        assert_eq!(
            kinds(r#"<b title = "a>b">"#),
            vec![(TokenKind::StartTag, r#"<b title = "a>b">"#)]
        );
        assert_eq!(
            kinds(r#"<b/="x>"#),
            vec![(TokenKind::StartTag, r#"<b/="x>"#)]
        );
    }

    #[test]
    fn unquoted_slash_is_not_self_closing() {
        assert_eq!(kinds("<a href=/>"), vec![(TokenKind::StartTag, "<a href=/>")]);
    }

    #[test]
    fn lone_angle_brackets_are_text() {
        assert_eq!(kinds("a < b > c"), vec![(TokenKind::Text, "a < b > c")]);
        assert_eq!(kinds("a<"), vec![(TokenKind::Text, "a<")]);
    }

    #[test]
    fn comments_doctypes_and_bogus_comments() {
        assert_eq!(
            kinds("<!-- x --><!DOCTYPE html><?php x ?></1><!-->"),
            vec![
                (TokenKind::Comment, "<!-- x -->"),
                (TokenKind::Doctype, "<!DOCTYPE html>"),
                (TokenKind::Comment, "<?php x ?>"),
                (TokenKind::Comment, "</1>"),
                (TokenKind::Comment, "<!-->"),
            ]
        );
    }

    #[test]
    fn truncated_tokens() {
        assert_eq!(kinds("<a href=\"x"), vec![(TokenKind::Truncated, "<a href=\"x")]);
        assert_eq!(kinds("x<!-- open"), vec![(TokenKind::Text, "x"), (TokenKind::Truncated, "<!-- open")]);
        assert_eq!(kinds("</"), vec![(TokenKind::Truncated, "</")]);
    }

    #[test]
    fn raw_text_runs_to_matching_end_tag() {
        let mut scanner = Scanner::new("<textarea><b>x</b></TEXTAREA >y");
        assert_eq!(scanner.next().unwrap().kind, TokenKind::StartTag);
        scanner.enter_raw_text("textarea");
        let text = scanner.next().unwrap();
        assert_eq!((text.kind, text.raw), (TokenKind::Text, "<b>x</b>"));
        let end = scanner.next().unwrap();
        assert_eq!((end.kind, end.raw), (TokenKind::EndTag, "</TEXTAREA >"));
        assert_eq!(scanner.next().unwrap().raw, "y");
    }

    #[test]
    fn escapes_disallowed_tags() {
        assert_eq!(
            preprocess(&DEFAULT_CONFIG, "<script>alert(1)</script><b onclick=\"x\">hi</b>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;<b onclick=\"x\">hi</b>"
        );
        assert_eq!(
            preprocess(&DEFAULT_CONFIG, "<foo title=\"a>b\">"),
            "&lt;foo title=&quot;a&gt;b&quot;&gt;"
        );
    }

    #[test]
    fn tags_hidden_behind_a_nameless_value_are_escaped() {
        let output = preprocess(&DEFAULT_CONFIG, "<b =\"x>\"<script>alert(1)</script></b>");
        assert_eq!(
            output,
            "<b =\"x>\"&lt;script&gt;alert(1)&lt;/script&gt;</b>"
        );

        let arena = typed_arena::Arena::new();
        let sanitizer = crate::Sanitizer::new(&arena, &DEFAULT_CONFIG);
        let mut elements = Vec::new();
        let mut pending = sanitizer.parse(&output);
        while let Some(node) = pending.pop() {
            if let Some(name) = node.element_name() {
                elements.push(name.local.to_string());
            }
            pending.extend(node.children());
        }
        assert_eq!(elements, vec!["b"]);
    }

    #[test]
    fn text_is_left_alone() {
        assert_eq!(preprocess(&DEFAULT_CONFIG, "foo>bar & baz"), "foo>bar & baz");
    }

    #[test]
    fn comments() {
        let input = "a<!-- hi -->b";
        assert_eq!(preprocess(&DEFAULT_CONFIG, input), input);
        assert_eq!(
            preprocess(&RESTRICTED_CONFIG, input),
            "a&lt;!-- hi --&gt;b"
        );
        assert_eq!(
            preprocess(&DEFAULT_CONFIG, "<!-- open"),
            "&lt;!-- open"
        );
        assert_eq!(
            preprocess(&DEFAULT_CONFIG, "<!x>"),
            "&lt;!x&gt;"
        );
    }

    #[test]
    fn doctypes_and_truncated_tags_are_escaped() {
        assert_eq!(
            preprocess(&DEFAULT_CONFIG, "<!DOCTYPE html>"),
            "&lt;!DOCTYPE html&gt;"
        );
        assert_eq!(
            preprocess(&DEFAULT_CONFIG, "<b>x<a href=\"y"),
            "<b>x&lt;a href=&quot;y"
        );
    }

    #[test]
    fn raw_text_only_for_allowed_elements() {
        let allowed = SanitizerConfig::empty().elem(vec!["textarea"]);
        assert_eq!(
            preprocess(&allowed, "<textarea><foo></textarea><foo>"),
            "<textarea><foo></textarea>&lt;foo&gt;"
        );
        assert_eq!(
            preprocess(&SanitizerConfig::empty(), "<textarea><foo></textarea>"),
            "&lt;textarea&gt;&lt;foo&gt;&lt;/textarea&gt;"
        );
    }

    #[test]
    fn multibyte_text_survives() {
        assert_eq!(
            preprocess(&DEFAULT_CONFIG, "héllo <b>wörld</b> ☃<x>"),
            "héllo <b>wörld</b> ☃&lt;x&gt;"
        );
    }
}
