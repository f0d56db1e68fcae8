//! Token scanner for JSON with comments.
//!
//! Bedrock addon files are read by the game with a lenient JSON reader that
//! tolerates `//` and `/* */` comments, so the scanner keeps comments as
//! first-class tokens. The parser skips them; completion uses them to avoid
//! suggesting anything inside a comment.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Colon,
    Comma,
    String,
    Number,
    True,
    False,
    Null,
    LineComment,
    BlockComment,
    Unknown,
    Eof,
}

impl TokenKind {
    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// A scanned token. `offset` and `len` are byte positions into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub len: usize,
    /// Set for strings and block comments missing their closing delimiter.
    pub unterminated: bool,
}

impl Token {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Start scanning at `offset`, clamped to the text and snapped back to a
    /// char boundary.
    pub fn at(text: &'a str, offset: usize) -> Self {
        let mut pos = offset.min(text.len());
        while !text.is_char_boundary(pos) {
            pos -= 1;
        }
        Self { text, pos }
    }

    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.bytes().get(self.pos) {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Scan the next token, skipping whitespace but not comments.
    pub fn scan(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;
        let bytes = self.bytes();

        let Some(&b) = bytes.get(start) else {
            return Token {
                kind: TokenKind::Eof,
                offset: start,
                len: 0,
                unterminated: false,
            };
        };

        let (kind, unterminated) = match b {
            b'{' => self.single(TokenKind::OpenBrace),
            b'}' => self.single(TokenKind::CloseBrace),
            b'[' => self.single(TokenKind::OpenBracket),
            b']' => self.single(TokenKind::CloseBracket),
            b':' => self.single(TokenKind::Colon),
            b',' => self.single(TokenKind::Comma),
            b'"' => self.scan_string(),
            b'/' if bytes.get(start + 1) == Some(&b'/') => {
                while let Some(&c) = self.bytes().get(self.pos) {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
                (TokenKind::LineComment, false)
            }
            b'/' if bytes.get(start + 1) == Some(&b'*') => self.scan_block_comment(),
            b'-' | b'0'..=b'9' => self.scan_number(),
            c if c.is_ascii_alphabetic() => {
                while let Some(&c) = self.bytes().get(self.pos) {
                    if c.is_ascii_alphanumeric() || c == b'_' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let kind = match &self.text[start..self.pos] {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    _ => TokenKind::Unknown,
                };
                (kind, false)
            }
            _ => {
                // advance a whole char so we never split a multi-byte sequence
                let width = self.text[start..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
                self.pos += width;
                (TokenKind::Unknown, false)
            }
        };

        Token {
            kind,
            offset: start,
            len: self.pos - start,
            unterminated,
        }
    }

    fn single(&mut self, kind: TokenKind) -> (TokenKind, bool) {
        self.pos += 1;
        (kind, false)
    }

    fn scan_string(&mut self) -> (TokenKind, bool) {
        self.pos += 1;
        let mut escaped = false;
        while let Some(&c) = self.bytes().get(self.pos) {
            match c {
                b'\n' | b'\r' => return (TokenKind::String, true),
                b'\\' if !escaped => escaped = true,
                b'"' if !escaped => {
                    self.pos += 1;
                    return (TokenKind::String, false);
                }
                _ => escaped = false,
            }
            self.pos += 1;
        }
        (TokenKind::String, true)
    }

    fn scan_block_comment(&mut self) -> (TokenKind, bool) {
        self.pos += 2;
        while self.pos < self.text.len() {
            if self.bytes()[self.pos] == b'*' && self.bytes().get(self.pos + 1) == Some(&b'/') {
                self.pos += 2;
                return (TokenKind::BlockComment, false);
            }
            self.pos += 1;
        }
        (TokenKind::BlockComment, true)
    }

    fn scan_number(&mut self) -> (TokenKind, bool) {
        let bytes = self.bytes();
        if bytes[self.pos] == b'-' {
            self.pos += 1;
        }
        let digits_start = self.pos;
        self.eat_digits();
        if self.pos == digits_start {
            return (TokenKind::Unknown, false);
        }
        if self.bytes().get(self.pos) == Some(&b'.') {
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.bytes().get(self.pos), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.bytes().get(self.pos), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.eat_digits();
        }
        (TokenKind::Number, false)
    }

    fn eat_digits(&mut self) {
        while let Some(c) = self.bytes().get(self.pos) {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = self.scan();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}

/// Kind of the first non-comment token at or after `offset`.
pub fn next_significant_token(text: &str, offset: usize) -> TokenKind {
    Scanner::at(text, offset)
        .map(|token| token.kind)
        .find(|kind| !kind.is_comment())
        .unwrap_or(TokenKind::Eof)
}

/// Whether `offset` lies inside a comment or directly at its end.
pub fn comment_at(text: &str, offset: usize) -> bool {
    Scanner::new(text)
        .take_while(|token| token.offset < offset)
        .any(|token| token.kind.is_comment() && offset > token.offset && offset <= token.end())
}

/// Decode the body of a JSON string token, tolerating a missing closing quote
/// and invalid escapes (which are kept verbatim).
pub fn unescape(raw: &str) -> String {
    let inner = raw.strip_prefix('"').unwrap_or(raw);
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('u') => {
                let high = read_hex4(&mut chars);
                match high {
                    Some(h) if (0xD800..0xDC00).contains(&h) => {
                        let mut lookahead = chars.clone();
                        let low = (lookahead.next() == Some('\\') && lookahead.next() == Some('u'))
                            .then(|| read_hex4(&mut lookahead))
                            .flatten()
                            .filter(|l| (0xDC00..0xE000).contains(l));
                        match low {
                            Some(l) => {
                                chars = lookahead;
                                let code = 0x10000 + ((h - 0xD800) << 10) + (l - 0xDC00);
                                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                            }
                            None => out.push('\u{FFFD}'),
                        }
                    }
                    Some(h) => out.push(char::from_u32(h).unwrap_or('\u{FFFD}')),
                    None => out.push_str("\\u"),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn read_hex4<I: Iterator<Item = char> + Clone>(chars: &mut std::iter::Peekable<I>) -> Option<u32> {
    let mut value = 0;
    for _ in 0..4 {
        let digit = chars.peek()?.to_digit(16)?;
        chars.next();
        value = value * 16 + digit;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Scanner::new(text).map(|t| t.kind).collect()
    }

    #[test]
    fn test_scans_punctuation_and_literals() {
        assert_eq!(
            kinds(r#"{"a": [1, -2.5e3, true, false, null]}"#),
            vec![
                TokenKind::OpenBrace,
                TokenKind::String,
                TokenKind::Colon,
                TokenKind::OpenBracket,
                TokenKind::Number,
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::Comma,
                TokenKind::True,
                TokenKind::Comma,
                TokenKind::False,
                TokenKind::Comma,
                TokenKind::Null,
                TokenKind::CloseBracket,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn test_scans_comments() {
        assert_eq!(
            kinds("// line\n/* block */ 1"),
            vec![
                TokenKind::LineComment,
                TokenKind::BlockComment,
                TokenKind::Number
            ]
        );
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let token = Scanner::scan(&mut Scanner::new("\"abc\n}"));
        assert_eq!(token.kind, TokenKind::String);
        assert!(token.unterminated);
        assert_eq!(token.len, 4);
    }

    #[test]
    fn test_next_significant_token_skips_comments() {
        let text = r#"{"a": 1 /* note */ , "b": 2}"#;
        assert_eq!(next_significant_token(text, 7), TokenKind::Comma);
        assert_eq!(next_significant_token(text, text.len()), TokenKind::Eof);
        assert_eq!(next_significant_token(text, text.len() - 1), TokenKind::CloseBrace);
    }

    #[test]
    fn test_comment_at() {
        let text = "{\n  // comment here\n  \"a\": 1\n}";
        let comment_start = text.find("//").unwrap();
        let comment_end = text.find("here").unwrap() + 4;
        assert!(!comment_at(text, comment_start));
        assert!(comment_at(text, comment_start + 3));
        assert!(comment_at(text, comment_end));
        assert!(!comment_at(text, comment_end + 4));
    }

    #[test]
    fn test_unescape_handles_surrogate_pairs() {
        assert_eq!(unescape(r#""a\nb""#), "a\nb");
        assert_eq!(unescape(r#""\ud83d\ude00""#), "😀");
        assert_eq!(unescape(r#""\u00e9""#), "é");
        assert_eq!(unescape("\"open"), "open");
    }
}
