//! # Command line lexer
//!
//! ## Overview
//!
//! The lexer turns a raw command line into a [TokenStream] of typed tokens.
//! Tokens never copy text: each one denotes a contiguous byte slice of the
//! input via its offset and length, which keeps diagnostics cheap (the error
//! log renders a caret straight into the retained line) and makes joining
//! adjacent tokens a length addition.
//!
//! Lexing itself never fails; malformed input is caught downstream by the
//! address and command parsers.

/// The classification of a [Token].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenKind {
    /// Placeholder produced when reading past the end of the stream.
    Invalid,

    /// A single punctuation byte: one of `/ ! ; : % # ? , . + - = '`.
    Delimiter,

    /// A `{` opening a command group.
    GroupStart,

    /// A `}` closing a command group.
    GroupEnd,

    /// A run of decimal digits.
    Number,

    /// A single mark letter following a `'` delimiter.
    Mark,

    /// Any other run of bytes.
    String,
}

/// A token over the raw command line: a kind plus the byte span it covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Token {
    /// Classification of the covered bytes.
    pub kind: TokenKind,

    /// Byte offset of the first covered byte.
    pub start: usize,

    /// Number of covered bytes.
    pub len: usize,
}

impl Token {
    fn invalid_at(start: usize) -> Self {
        Token { kind: TokenKind::Invalid, start, len: 0 }
    }

    /// Byte offset one past the last covered byte.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Whether this is the end-of-stream placeholder.
    pub fn is_invalid(&self) -> bool {
        self.kind == TokenKind::Invalid
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'/' | b'!' | b';' | b':' | b'%' | b'#' | b'?' | b',' | b'.' | b'+' | b'-' | b'=' | b'\'')
}

fn is_address_delimiter(b: u8) -> bool {
    matches!(b, b';' | b',' | b'+' | b'-')
}

/// An ordered sequence of tokens with a read cursor.
///
/// The stream retains the raw line so that parsers can slice token text and
/// the error log can point a caret at the offending byte. Reads advance the
/// cursor only; the tokens themselves are immutable.
#[derive(Clone, Debug)]
pub struct TokenStream {
    raw: String,
    tokens: Vec<Token>,
    read: usize,
}

impl TokenStream {
    /// Lex a raw command line.
    ///
    /// Rules, applied greedily left to right: ASCII whitespace flushes the
    /// current string accumulator and is discarded; digit runs become
    /// [TokenKind::Number]; `{`/`}` become group tokens; a leading `>`, `<`,
    /// or `|` becomes a one-byte string (the pipe commands); the punctuation
    /// bytes listed on [TokenKind::Delimiter] become one-byte delimiters,
    /// with the letter after a `'` lexed as a dedicated [TokenKind::Mark];
    /// everything else extends the accumulator.
    pub fn lex(line: &str) -> Self {
        let raw = line.to_string();
        let bytes = raw.as_bytes();
        let mut tokens = Vec::new();
        let mut pos = 0;
        let mut accum = Token { kind: TokenKind::String, start: 0, len: 0 };

        let flush = |tokens: &mut Vec<Token>, accum: &mut Token, next: usize| {
            if accum.len > 0 {
                tokens.push(*accum);
            }
            *accum = Token { kind: TokenKind::String, start: next, len: 0 };
        };

        while pos < bytes.len() {
            let b = bytes[pos];

            if b.is_ascii_whitespace() {
                pos += 1;
                flush(&mut tokens, &mut accum, pos);
            } else if b.is_ascii_digit() {
                flush(&mut tokens, &mut accum, pos);
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                tokens.push(Token { kind: TokenKind::Number, start, len: pos - start });
                accum.start = pos;
            } else if b == b'{' || b == b'}' {
                flush(&mut tokens, &mut accum, pos);
                let kind = if b == b'{' { TokenKind::GroupStart } else { TokenKind::GroupEnd };
                tokens.push(Token { kind, start: pos, len: 1 });
                pos += 1;
                accum.start = pos;
            } else if (b == b'>' || b == b'<' || b == b'|') && accum.len == 0 {
                // pipe commands at the start of a word
                tokens.push(Token { kind: TokenKind::String, start: pos, len: 1 });
                pos += 1;
                accum.start = pos;
            } else if is_delimiter(b) {
                flush(&mut tokens, &mut accum, pos);
                tokens.push(Token { kind: TokenKind::Delimiter, start: pos, len: 1 });
                pos += 1;
                if b == b'\'' && pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
                    tokens.push(Token { kind: TokenKind::Mark, start: pos, len: 1 });
                    pos += 1;
                }
                accum.start = pos;
            } else {
                accum.len += 1;
                pos += 1;
            }
        }
        if accum.len > 0 {
            tokens.push(accum);
        }

        TokenStream { raw, tokens, read: 0 }
    }

    /// The retained raw line.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The text covered by a token.
    pub fn text(&self, tok: Token) -> &str {
        &self.raw[tok.start..tok.end()]
    }

    /// All lexed tokens, in order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// True iff the stream holds at least one token, none of them invalid,
    /// and the `{`/`}` tokens balance out.
    pub fn validate(&self) -> bool {
        let mut nesting = 0i32;
        for tok in &self.tokens {
            match tok.kind {
                TokenKind::Invalid => return false,
                TokenKind::GroupStart => nesting += 1,
                TokenKind::GroupEnd => nesting -= 1,
                _ => {},
            }
        }
        !self.tokens.is_empty() && nesting == 0
    }

    /// The next token without advancing the cursor.
    pub fn peek(&self) -> Token {
        self.peek_at(0)
    }

    /// The token `n` positions ahead of the cursor.
    pub fn peek_at(&self, n: usize) -> Token {
        match self.tokens.get(self.read + n) {
            Some(tok) => *tok,
            None => Token::invalid_at(self.raw.len()),
        }
    }

    /// The next token, advancing the cursor.
    pub fn pop(&mut self) -> Token {
        let tok = self.peek();
        if !tok.is_invalid() {
            self.read += 1;
        }
        tok
    }

    /// Whether every token has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.read >= self.tokens.len()
    }

    /// Consume the remainder of the stream, returning the covered raw text.
    pub fn drain_to_end(&mut self) -> &str {
        let start = self.peek().start;
        self.read = self.tokens.len();
        &self.raw[start.min(self.raw.len())..]
    }

    /// Join contiguous tokens into one string token, stopping at the first
    /// byte gap (i.e. at whitespace). Returns an invalid token at the end of
    /// the stream.
    pub fn join_until_space(&mut self) -> Token {
        let mut result = Token { kind: TokenKind::Invalid, start: self.peek().start, len: 0 };
        loop {
            let next = self.peek();
            if next.is_invalid()
                || matches!(next.kind, TokenKind::GroupStart | TokenKind::GroupEnd)
                || result.end() != next.start
            {
                break;
            }
            result.len += self.pop().len;
        }
        if result.len > 0 {
            result.kind = TokenKind::String;
        }
        result
    }

    /// Consume a delimited string: the next token must be a delimiter, and
    /// the result covers everything up to the matching unescaped delimiter
    /// (or the end of the line when unterminated). The span may be empty.
    ///
    /// Returns `None` when the cursor is not on a delimiter.
    pub fn delimited_string(&mut self) -> Option<Token> {
        if self.peek().kind != TokenKind::Delimiter {
            return None;
        }
        let open = self.pop();
        Some(self.delimited_from(open))
    }

    /// Like [delimited_string](Self::delimited_string), for an opening
    /// delimiter that has already been popped.
    pub fn delimited_from(&mut self, open: Token) -> Token {
        let delim = self.raw.as_bytes()[open.start];
        let start = open.end();

        while !self.peek().is_invalid() {
            let tok = self.pop();
            if tok.kind == TokenKind::Delimiter
                && self.raw.as_bytes()[tok.start] == delim
                && !self.escaped_at(tok.start, start)
            {
                return Token { kind: TokenKind::String, start, len: tok.start - start };
            }
        }

        Token { kind: TokenKind::String, start, len: self.raw.len() - start }
    }

    fn escaped_at(&self, pos: usize, floor: usize) -> bool {
        let bytes = self.raw.as_bytes();
        let mut backslashes = 0;
        while pos > floor + backslashes && bytes[pos - backslashes - 1] == b'\\' {
            backslashes += 1;
        }
        backslashes % 2 == 1
    }

    /// Consume an optionally signed number token, joining a `+`/`-`
    /// delimiter with the digits that follow it.
    pub fn try_pop_number(&mut self) -> Option<Token> {
        let first = self.peek();
        if first.kind == TokenKind::Delimiter {
            let sign = self.raw.as_bytes()[first.start];
            let digits = self.peek_at(1);
            if (sign == b'+' || sign == b'-')
                && digits.kind == TokenKind::Number
                && digits.start == first.end()
            {
                self.pop();
                self.pop();
                return Some(Token {
                    kind: TokenKind::Number,
                    start: first.start,
                    len: first.len + digits.len,
                });
            }
            return None;
        }
        if first.kind == TokenKind::Number {
            return Some(self.pop());
        }
        None
    }

    /// Consume a trailing `!` delimiter if present.
    pub fn check_pop_force(&mut self) -> bool {
        let tok = self.peek();
        let force = tok.kind == TokenKind::Delimiter && self.raw.as_bytes()[tok.start] == b'!';
        if force {
            self.pop();
        }
        force
    }

    /// Extend an already-popped token over the bytes of a command name:
    /// anything that is not whitespace, a digit, or punctuation other than
    /// `_` (with an inner `-` allowed, for names like `map-window`).
    pub fn join_command_name(&mut self, start: Token) -> Token {
        let bytes = self.raw.as_bytes();
        let mut result = start;
        let mut end = start.len;

        while start.start + end < bytes.len() {
            let b = bytes[start.start + end];
            let mut valid = !b.is_ascii_whitespace()
                && !b.is_ascii_digit()
                && (!b.is_ascii_punctuation() || b == b'_');
            if !valid && b == b'-' {
                valid = start.start + end + 1 < bytes.len();
            }
            if !valid {
                break;
            }
            end += 1;
        }

        while result.len < end {
            let next = self.peek();
            if next.is_invalid() || next.start != result.end() || next.end() > start.start + end {
                break;
            }
            result.len += self.pop().len;
        }
        result
    }

    /// Whether the token is a one-byte delimiter equal to `b`.
    pub fn delim_is(&self, tok: Token, b: u8) -> bool {
        tok.kind == TokenKind::Delimiter && self.raw.as_bytes()[tok.start] == b
    }

    /// The delimiter byte under a delimiter token.
    pub fn delim_byte(&self, tok: Token) -> u8 {
        self.raw.as_bytes()[tok.start]
    }

    /// Whether the token is one of the address combiners `, ; + -`.
    pub fn is_address_delim(&self, tok: Token) -> bool {
        tok.kind == TokenKind::Delimiter && is_address_delimiter(self.raw.as_bytes()[tok.start])
    }

    /// Parse the (possibly signed) integer value of a number token.
    pub fn number_value(&self, tok: Token) -> Option<i64> {
        self.text(tok).parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<(TokenKind, String)> {
        let s = TokenStream::lex(line);
        s.tokens().iter().map(|t| (t.kind, s.text(*t).to_string())).collect()
    }

    #[test]
    fn test_lex_basic() {
        use TokenKind::*;

        assert_eq!(kinds("5,10d"), vec![
            (Number, "5".into()),
            (Delimiter, ",".into()),
            (Number, "10".into()),
            (String, "d".into()),
        ]);

        assert_eq!(kinds(",x/foo/ c/bar/"), vec![
            (Delimiter, ",".into()),
            (String, "x".into()),
            (Delimiter, "/".into()),
            (String, "foo".into()),
            (Delimiter, "/".into()),
            (String, "c".into()),
            (Delimiter, "/".into()),
            (String, "bar".into()),
            (Delimiter, "/".into()),
        ]);
    }

    #[test]
    fn test_lex_groups_and_pipes() {
        use TokenKind::*;

        assert_eq!(kinds("{ a/x/ | d }"), vec![
            (GroupStart, "{".into()),
            (String, "a".into()),
            (Delimiter, "/".into()),
            (String, "x".into()),
            (Delimiter, "/".into()),
            (String, "|".into()),
            (String, "d".into()),
            (GroupEnd, "}".into()),
        ]);

        // > < | only form their own token at the start of a word
        assert_eq!(kinds("a|b"), vec![(String, "a|b".into())]);
        assert_eq!(kinds("> wc"), vec![(String, ">".into()), (String, "wc".into())]);
    }

    #[test]
    fn test_lex_mark_token() {
        use TokenKind::*;

        assert_eq!(kinds("'a,'bd"), vec![
            (Delimiter, "'".into()),
            (Mark, "a".into()),
            (Delimiter, ",".into()),
            (Delimiter, "'".into()),
            (Mark, "b".into()),
            (String, "d".into()),
        ]);
    }

    #[test]
    fn test_lex_round_trip() {
        for line in [",x/foo/ c/bar/", "5,10d", "w file", "{ a/x/ | d }", "#10;'m+3p"] {
            let s = TokenStream::lex(line);
            let joined: String = s.tokens().iter().map(|t| s.text(*t)).collect();
            let squashed: String = line.split_ascii_whitespace().collect();
            assert_eq!(joined, squashed, "round trip for {line:?}");

            let mut last = 0;
            for t in s.tokens() {
                assert!(t.start >= last, "offsets must be monotone");
                last = t.start;
            }
        }
    }

    #[test]
    fn test_validate() {
        assert!(TokenStream::lex("{ d }").validate());
        assert!(TokenStream::lex("} {").validate());
        assert!(!TokenStream::lex("{ d").validate());
        assert!(!TokenStream::lex("").validate());
        assert!(!TokenStream::lex("   ").validate());
    }

    #[test]
    fn test_join_until_space() {
        let mut s = TokenStream::lex("foo.txt bar");
        let tok = s.join_until_space();
        assert_eq!(s.text(tok), "foo.txt");
        let tok = s.join_until_space();
        assert_eq!(s.text(tok), "bar");
        assert!(s.join_until_space().is_invalid());
    }

    #[test]
    fn test_delimited_string() {
        let mut s = TokenStream::lex("/foo/");
        let tok = s.delimited_string().unwrap();
        assert_eq!(s.text(tok), "foo");
        assert!(s.is_exhausted());

        // unterminated extends to the end of the line
        let mut s = TokenStream::lex("/foo");
        let tok = s.delimited_string().unwrap();
        assert_eq!(s.text(tok), "foo");

        // escaped delimiters do not terminate
        let mut s = TokenStream::lex("/a\\/b/");
        let tok = s.delimited_string().unwrap();
        assert_eq!(s.text(tok), "a\\/b");

        // empty string is a valid span
        let mut s = TokenStream::lex("//x");
        let tok = s.delimited_string().unwrap();
        assert_eq!(tok.len, 0);
    }

    #[test]
    fn test_try_pop_number() {
        let mut s = TokenStream::lex("-5,3");
        let tok = s.try_pop_number().unwrap();
        assert_eq!(s.number_value(tok), Some(-5));

        // a bare sign is left alone
        let mut s = TokenStream::lex("-d");
        assert!(s.try_pop_number().is_none());
        assert_eq!(s.peek().kind, TokenKind::Delimiter);
    }

    #[test]
    fn test_join_command_name() {
        let mut s = TokenStream::lex("map-window normal x y");
        let start = s.pop();
        let name = s.join_command_name(start);
        assert_eq!(s.text(name), "map-window");

        let mut s = TokenStream::lex("e!");
        let start = s.pop();
        let name = s.join_command_name(start);
        assert_eq!(s.text(name), "e");
        assert!(s.check_pop_force());
    }
}
