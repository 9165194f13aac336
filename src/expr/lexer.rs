use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    Ident(String),
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplatePart {
    Text(String),
    Expr(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Punct {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    OptionalDot,
    Question,
    Colon,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
    Nullish,
    Assign,
}

impl Punct {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::OptionalDot => "?.",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Not => "!",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
            Self::Assign => "=",
        }
    }
}

// Longest operators first so `===` wins over `==` and `=`.
const PUNCTUATORS: &[(&str, Punct)] = &[
    ("===", Punct::StrictEq),
    ("!==", Punct::StrictNe),
    ("==", Punct::Eq),
    ("!=", Punct::Ne),
    ("<=", Punct::Le),
    (">=", Punct::Ge),
    ("&&", Punct::And),
    ("||", Punct::Or),
    ("??", Punct::Nullish),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    (",", Punct::Comma),
    (".", Punct::Dot),
    ("?", Punct::Question),
    (":", Punct::Colon),
    ("!", Punct::Not),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
    ("<", Punct::Lt),
    (">", Punct::Gt),
    ("=", Punct::Assign),
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) pos: usize,
}

#[derive(Debug)]
struct Lexer<'a> {
    src: &'a str,
    i: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        lexer.skip_ws();
        let pos = lexer.i;
        let Some(ch) = lexer.peek_char() else {
            out.push(Spanned {
                token: Token::Eof,
                pos,
            });
            return Ok(out);
        };

        let token = if ch.is_ascii_digit()
            || (ch == '.' && lexer.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            lexer.read_number()?
        } else if ch == '\'' || ch == '"' {
            Token::Str(lexer.read_string(ch)?)
        } else if ch == '`' {
            Token::Template(lexer.read_template()?)
        } else if is_ident_start(ch) {
            Token::Ident(lexer.read_identifier())
        } else if lexer.starts_with("?.")
            && !lexer.peek_char_at(2).is_some_and(|c| c.is_ascii_digit())
        {
            lexer.i += 2;
            Token::Punct(Punct::OptionalDot)
        } else {
            Token::Punct(lexer.read_punct()?)
        };
        out.push(Spanned { token, pos });
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric()
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, i: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.i..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.i += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, token: &str) -> bool {
        self.rest().starts_with(token)
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.i += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.i;
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.i += ch.len_utf8();
            } else {
                break;
            }
        }
        self.src[start..self.i].to_string()
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.i;
        if self.starts_with("0x") || self.starts_with("0X") {
            self.i += 2;
            let digits_start = self.i;
            while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.i += 1;
            }
            let digits = &self.src[digits_start..self.i];
            return u64::from_str_radix(digits, 16)
                .map(|value| Token::Number(value as f64))
                .map_err(|_| {
                    Error::ExpressionParse(format!("invalid hex literal at {start}"))
                });
        }

        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.i += 1;
        }
        if self.peek_char() == Some('.') {
            self.i += 1;
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.i += 1;
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let mark = self.i;
            self.i += 1;
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.i += 1;
            }
            if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.i += 1;
                }
            } else {
                self.i = mark;
            }
        }
        if self.peek_char().is_some_and(is_ident_start) {
            return Err(Error::ExpressionParse(format!(
                "identifier directly after number at {}",
                self.i
            )));
        }
        self.src[start..self.i]
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| Error::ExpressionParse(format!("invalid number literal at {start}")))
    }

    fn read_string(&mut self, quote: char) -> Result<String> {
        let start = self.i;
        self.i += quote.len_utf8();
        let mut out = String::new();
        loop {
            let Some(ch) = self.next_char() else {
                return Err(Error::ExpressionParse(format!(
                    "unterminated string literal at {start}"
                )));
            };
            if ch == quote {
                return Ok(out);
            }
            if ch == '\\' {
                out.push(self.read_escape()?);
                continue;
            }
            out.push(ch);
        }
    }

    fn read_escape(&mut self) -> Result<char> {
        let at = self.i;
        let Some(ch) = self.next_char() else {
            return Err(Error::ExpressionParse(format!("dangling escape at {at}")));
        };
        let escaped = match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'x' => self.read_hex_escape(2)?,
            'u' => {
                if self.peek_char() == Some('{') {
                    self.i += 1;
                    let digits_start = self.i;
                    while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                        self.i += 1;
                    }
                    let digits = &self.src[digits_start..self.i];
                    if self.next_char() != Some('}') {
                        return Err(Error::ExpressionParse(format!(
                            "invalid unicode escape at {at}"
                        )));
                    }
                    decode_code_point(digits, at)?
                } else {
                    self.read_hex_escape(4)?
                }
            }
            other => other,
        };
        Ok(escaped)
    }

    fn read_hex_escape(&mut self, len: usize) -> Result<char> {
        let at = self.i;
        let end = self.i + len;
        let digits = self
            .src
            .get(self.i..end)
            .filter(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| Error::ExpressionParse(format!("invalid hex escape at {at}")))?;
        self.i = end;
        decode_code_point(digits, at)
    }

    fn read_template(&mut self) -> Result<Vec<TemplatePart>> {
        let start = self.i;
        self.i += 1;
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            let Some(ch) = self.next_char() else {
                return Err(Error::ExpressionParse(format!(
                    "unterminated template literal at {start}"
                )));
            };
            match ch {
                '`' => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(text));
                    }
                    return Ok(parts);
                }
                '\\' => text.push(self.read_escape()?),
                '$' if self.peek_char() == Some('{') => {
                    self.i += 1;
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(TemplatePart::Expr(self.read_template_substitution()?));
                }
                other => text.push(other),
            }
        }
    }

    fn read_template_substitution(&mut self) -> Result<String> {
        let start = self.i;
        let mut depth = 0usize;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(Error::ExpressionParse(format!(
                    "unterminated template substitution at {start}"
                )));
            };
            match ch {
                '\'' | '"' => {
                    self.read_string(ch)?;
                }
                '`' => {
                    self.read_template()?;
                }
                '{' => {
                    depth += 1;
                    self.i += 1;
                }
                '}' if depth == 0 => {
                    let body = self.src[start..self.i].to_string();
                    self.i += 1;
                    return Ok(body);
                }
                '}' => {
                    depth -= 1;
                    self.i += 1;
                }
                other => self.i += other.len_utf8(),
            }
        }
    }

    fn read_punct(&mut self) -> Result<Punct> {
        for (text, punct) in PUNCTUATORS {
            if self.starts_with(text) {
                self.i += text.len();
                return Ok(*punct);
            }
        }
        let ch = self.peek_char().unwrap_or_default();
        Err(Error::ExpressionParse(format!(
            "unexpected character '{ch}' at {}",
            self.i
        )))
    }
}

fn decode_code_point(digits: &str, at: usize) -> Result<char> {
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| Error::ExpressionParse(format!("invalid code point escape at {at}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn optional_dot_is_not_confused_with_ternary_decimal() {
        assert_eq!(
            kinds("a?.5:1"),
            vec![
                Token::Ident("a".into()),
                Token::Punct(Punct::Question),
                Token::Number(0.5),
                Token::Punct(Punct::Colon),
                Token::Number(1.0),
                Token::Eof,
            ]
        );
        assert_eq!(
            kinds("a?.b")[1],
            Token::Punct(Punct::OptionalDot),
        );
    }

    #[test]
    fn template_substitution_tracks_nested_braces() {
        let tokens = kinds("`x${ {a: 1}.a }y`");
        assert_eq!(
            tokens[0],
            Token::Template(vec![
                TemplatePart::Text("x".into()),
                TemplatePart::Expr(" {a: 1}.a ".into()),
                TemplatePart::Text("y".into()),
            ])
        );
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            kinds(r#"'a\'b\nA\u{1F600}'"#)[0],
            Token::Str("a'b\nA\u{1F600}".into())
        );
    }

    #[test]
    fn unterminated_string_is_a_parse_error() {
        let err = tokenize("'abc").expect_err("unterminated literal should fail");
        assert!(matches!(err, Error::ExpressionParse(msg) if msg.contains("unterminated")));
    }
}
