//! Tokenizer for the restricted script grammar
//!
//! The lexer understands enough of the full language (comments, regex and
//! template literals, every punctuator) to skip over code it does not
//! evaluate, so function bodies never derail literal extraction.

use thiserror::Error;

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// Decoded string literal
    Str(String),
    /// Number lexeme
    Num(String),
    Punct(&'static str),
    Regex,
    Template,
    Eof,
}

/// Error raised when the script is not lexically or syntactically valid
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Longest punctuators first so greedy matching picks the right one
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "<<", ">>", "**", "{", "}", "(", ")", "[", "]", ";", ",", ":", ".", "=", "?",
    "!", "+", "-", "*", "/", "%", "<", ">", "&", "|", "^", "~",
];

/// Keywords after which a `/` starts a regex literal
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else",
];

/// Tokenizes a script source
pub fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut lexer = Lexer {
        chars: src.char_indices().collect(),
        pos: 0,
        at_line_start: true,
    };
    let mut tokens: Vec<(Token, usize)> = Vec::new();

    loop {
        lexer.skip_trivia()?;
        let offset = lexer.offset();
        let Some(c) = lexer.peek(0) else {
            tokens.push((Token::Eof, offset));
            return Ok(tokens);
        };

        let token = if c == '"' || c == '\'' {
            Token::Str(lexer.string(c)?)
        } else if c == '`' {
            lexer.template()?;
            Token::Template
        } else if c.is_ascii_digit() || (c == '.' && lexer.peek(1).is_some_and(|d| d.is_ascii_digit())) {
            Token::Num(lexer.number()?)
        } else if is_ident_start(c) {
            Token::Ident(lexer.ident())
        } else if c == '/' && regex_allowed(tokens.last().map(|(t, _)| t)) {
            lexer.regex()?;
            Token::Regex
        } else {
            Token::Punct(lexer.punct()?)
        };
        tokens.push((token, offset));
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn regex_allowed(prev: Option<&Token>) -> bool {
    match prev {
        None => true,
        Some(Token::Punct(p)) => !matches!(*p, ")" | "]" | "}" | "++" | "--"),
        Some(Token::Ident(word)) => REGEX_PRECEDING_KEYWORDS.contains(&word.as_str()),
        Some(_) => false,
    }
}

struct Lexer {
    chars: Vec<(usize, char)>,
    pos: usize,
    at_line_start: bool,
}

impl Lexer {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or_else(|| self.chars.last().map(|(i, c)| i + c.len_utf8()).unwrap_or(0))
    }

    fn starts_with(&self, pat: &str) -> bool {
        pat.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;
        Some(c)
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                self.at_line_start = true;
                self.pos += 1;
            } else if c.is_whitespace() {
                self.pos += 1;
            } else if self.starts_with("//") || self.starts_with("<!--") {
                self.skip_line();
            } else if self.at_line_start && self.starts_with("-->") {
                self.skip_line();
            } else if self.starts_with("/*") {
                let start = self.offset();
                self.pos += 2;
                loop {
                    if self.starts_with("*/") {
                        self.pos += 2;
                        break;
                    }
                    match self.bump() {
                        Some('\n') => self.at_line_start = true,
                        Some(_) => {}
                        None => return Err(ParseError::new("unterminated comment", start)),
                    }
                }
            } else {
                self.at_line_start = false;
                break;
            }
        }
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.offset();
        let mut raw = String::new();
        raw.push(quote);
        self.pos += 1;
        loop {
            match self.bump() {
                None | Some('\n') => return Err(ParseError::new("unterminated string", start)),
                Some('\\') => {
                    raw.push('\\');
                    match self.bump() {
                        Some(c) => raw.push(c),
                        None => return Err(ParseError::new("unterminated string", start)),
                    }
                }
                Some(c) if c == quote => {
                    raw.push(c);
                    break;
                }
                Some(c) => raw.push(c),
            }
        }
        decode_string_literal(&raw).ok_or_else(|| ParseError::new("invalid escape sequence", start))
    }

    fn template(&mut self) -> Result<(), ParseError> {
        let start = self.offset();
        self.pos += 1;
        loop {
            match self.bump() {
                None => return Err(ParseError::new("unterminated template literal", start)),
                Some('\\') => {
                    self.pos += 1;
                }
                Some('`') => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn number(&mut self) -> Result<String, ParseError> {
        let start = self.offset();
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X')) {
            self.pos += 2;
            let mut digits = String::new();
            while let Some(c) = self.peek(0).filter(|c| c.is_ascii_hexdigit() || *c == '_') {
                if c != '_' {
                    digits.push(c);
                }
                self.pos += 1;
            }
            return i64::from_str_radix(&digits, 16)
                .map(|n| n.to_string())
                .map_err(|_| ParseError::new("invalid hex literal", start));
        }

        let mut lexeme = String::new();
        while let Some(c) = self.peek(0) {
            let exponent_sign = matches!(c, '+' | '-') && matches!(lexeme.chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                lexeme.push(c);
                self.pos += 1;
            } else if c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.peek(0) == Some('n') {
            // BigInt suffix
            self.pos += 1;
        }
        if self.peek(0).is_some_and(is_ident_start) {
            return Err(ParseError::new("identifier directly after number", start));
        }
        lexeme
            .parse::<f64>()
            .map(|_| lexeme.clone())
            .map_err(|_| ParseError::new(format!("invalid number '{}'", lexeme), start))
    }

    fn ident(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek(0).filter(|c| is_ident_part(*c)) {
            word.push(c);
            self.pos += 1;
        }
        word
    }

    fn regex(&mut self) -> Result<(), ParseError> {
        let start = self.offset();
        self.pos += 1;
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') => return Err(ParseError::new("unterminated regex", start)),
                Some('\\') => {
                    self.pos += 1;
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        while self.peek(0).is_some_and(is_ident_part) {
            self.pos += 1;
        }
        Ok(())
    }

    fn punct(&mut self) -> Result<&'static str, ParseError> {
        for p in PUNCTUATORS {
            if self.starts_with(p) {
                self.pos += p.chars().count();
                return Ok(p);
            }
        }
        let c = self.peek(0).unwrap_or('\0');
        Err(ParseError::new(format!("unexpected character '{}'", c), self.offset()))
    }
}

/// Decodes a quoted string literal
///
/// Strips exactly one pair of matching surrounding quotes (never greedily)
/// and resolves backslash escapes. Returns `None` when the input is not a
/// single quoted literal or contains a malformed escape.
///
/// ```
/// use forum_archiver::extract::decode_string_literal;
///
/// assert_eq!(decode_string_literal(r#""a\"b""#).as_deref(), Some("a\"b"));
/// assert_eq!(decode_string_literal(r#""\"x\"""#).as_deref(), Some("\"x\""));
/// ```
pub fn decode_string_literal(raw: &str) -> Option<String> {
    let quote = raw.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = raw.strip_prefix(quote)?.strip_suffix(quote)?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|d| d.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' => {
                let code = if chars.peek() == Some(&'{') {
                    chars.next();
                    let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    u32::from_str_radix(&hex, 16).ok()?
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    u32::from_str_radix(&hex, 16).ok()?
                };
                out.push(decode_code_unit(code, &mut chars)?);
            }
            // line continuation
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Combines a UTF-16 surrogate pair written as two `\uXXXX` escapes
fn decode_code_unit(code: u32, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<char> {
    if !(0xD800..0xDC00).contains(&code) {
        return Some(char::from_u32(code).unwrap_or('\u{FFFD}'));
    }
    let mut lookahead = chars.clone();
    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
        let hex: String = lookahead.by_ref().take(4).collect();
        if let Ok(low) = u32::from_str_radix(&hex, 16) {
            if (0xDC00..0xE000).contains(&low) {
                *chars = lookahead;
                let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(combined);
            }
        }
    }
    Some('\u{FFFD}')
}
