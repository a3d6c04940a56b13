//! Formula tokenizer.
//!
//! Splits formula text into alphanumeric runs, quoted strings, separators,
//! signs and brackets. Scanning is restartable from any byte offset, so
//! callers can walk a string one token at a time with [`next_token`] or use
//! the [`Lexer`] iterator.
//!
//! The three bracket pairs `()`, `[]` and `{}` are interchangeable: callers
//! only ever care about nesting depth.

/// Kind of a lexed token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of letters and digits, plus any characters enabled in [`LexOptions`].
    AlphaNum,
    /// Quoted string, quote characters included.
    Quoted,
    /// One of `,` `;` `:`.
    Symbol,
    /// `+` or `-`.
    Sign,
    /// `(`, `[` or `{`.
    Open,
    /// `)`, `]` or `}`.
    Close,
    /// Any other single character (`*`, `/`, `#`, ...).
    Other,
    /// No more input.
    End,
}

/// A token borrowed from the scanned input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the first character of `text`.
    pub start: usize,
}

impl<'a> Token<'a> {
    fn end_of(input: &'a str) -> Self {
        Token {
            kind: TokenKind::End,
            text: "",
            start: input.len(),
        }
    }

    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_symbol(&self, symbol: char) -> bool {
        self.kind == TokenKind::Symbol && self.text.starts_with(symbol)
    }
}

/// Which characters extend an alphanumeric run, and what quotes a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexOptions<'a> {
    pub allow_dot: bool,
    pub allow_dollar: bool,
    pub extra: &'a [char],
    pub quote: char,
}

impl Default for LexOptions<'_> {
    /// Formula lexing: numbers keep their decimal point and addresses keep
    /// their `$` markers.
    fn default() -> Self {
        LexOptions {
            allow_dot: true,
            allow_dollar: true,
            extra: &[],
            quote: '\'',
        }
    }
}

impl<'a> LexOptions<'a> {
    /// Alphanumeric runs only, no `.` or `$`.
    pub fn plain() -> Self {
        LexOptions {
            allow_dot: false,
            allow_dollar: false,
            ..LexOptions::default()
        }
    }

    pub fn with_extra(self, extra: &'a [char]) -> Self {
        LexOptions { extra, ..self }
    }

    pub fn with_quote(self, quote: char) -> Self {
        LexOptions { quote, ..self }
    }

    fn is_word_char(&self, ch: char) -> bool {
        ch.is_alphanumeric()
            || (self.allow_dot && ch == '.')
            || (self.allow_dollar && ch == '$')
            || self.extra.contains(&ch)
    }
}

/// Scan the token starting at or after byte offset `pos`.
///
/// Leading whitespace is skipped. An unterminated quoted string runs to the
/// end of the input. A `pos` past the end (or not on a char boundary) yields
/// [`TokenKind::End`].
pub fn next_token<'a>(input: &'a str, pos: usize, opts: &LexOptions<'_>) -> Token<'a> {
    let Some(rest) = input.get(pos..) else {
        return Token::end_of(input);
    };
    let mut chars = rest.char_indices();
    let (offset, ch) = loop {
        match chars.next() {
            None => return Token::end_of(input),
            Some((_, c)) if c.is_whitespace() => continue,
            Some(found) => break found,
        }
    };
    let start = pos + offset;

    if ch == opts.quote {
        let body = start + ch.len_utf8();
        let end = match input[body..].find(opts.quote) {
            Some(i) => body + i + opts.quote.len_utf8(),
            None => input.len(),
        };
        return Token {
            kind: TokenKind::Quoted,
            text: &input[start..end],
            start,
        };
    }

    if opts.is_word_char(ch) {
        let mut end = word_end(input, start, opts);
        if let Some(digits) = exponent_digits(input, start, end) {
            end = word_end(input, digits, opts);
        }
        return Token {
            kind: TokenKind::AlphaNum,
            text: &input[start..end],
            start,
        };
    }

    let kind = match ch {
        ',' | ';' | ':' => TokenKind::Symbol,
        '+' | '-' => TokenKind::Sign,
        '(' | '[' | '{' => TokenKind::Open,
        ')' | ']' | '}' => TokenKind::Close,
        _ => TokenKind::Other,
    };
    Token {
        kind,
        text: &input[start..start + ch.len_utf8()],
        start,
    }
}

/// Byte offset where the word starting at `from` ends.
fn word_end(input: &str, from: usize, opts: &LexOptions<'_>) -> usize {
    input[from..]
        .char_indices()
        .find(|&(_, c)| !opts.is_word_char(c))
        .map_or(input.len(), |(i, _)| from + i)
}

/// For a number ending in `e` (`1.5e-3`), the offset of the exponent digits
/// after the sign.
fn exponent_digits(input: &str, start: usize, end: usize) -> Option<usize> {
    let word = &input[start..end];
    let numeric = word.trim_start_matches('.').starts_with(|c: char| c.is_ascii_digit());
    if !numeric || !word.ends_with(['e', 'E']) {
        return None;
    }
    let mut rest = input[end..].chars();
    match (rest.next(), rest.next()) {
        (Some('+' | '-'), Some(d)) if d.is_ascii_digit() => Some(end + 1),
        _ => None,
    }
}

/// Iterator over the tokens of a string. Does not yield the `End` token.
#[derive(Clone, Debug)]
pub struct Lexer<'a, 'o> {
    input: &'a str,
    pos: usize,
    opts: LexOptions<'o>,
}

impl<'a, 'o> Lexer<'a, 'o> {
    pub fn new(input: &'a str, opts: LexOptions<'o>) -> Self {
        Lexer {
            input,
            pos: 0,
            opts,
        }
    }
}

impl<'a> Iterator for Lexer<'a, '_> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = next_token(self.input, self.pos, &self.opts);
        if token.kind == TokenKind::End {
            return None;
        }
        self.pos = token.end();
        Some(token)
    }
}

/// Tokenize a whole string with the default formula options.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input, LexOptions::default()).collect()
}
