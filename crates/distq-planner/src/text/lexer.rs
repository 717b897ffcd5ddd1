//! Plan text tokenizer.

use distq_operators::CmpOp;

use crate::error::{PlanError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    QuotedIdent(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(CmpOp),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("'{s}'"),
            TokenKind::QuotedIdent(s) => format!("\"{s}\""),
            TokenKind::Int(i) => i.to_string(),
            TokenKind::Float(f) => format!("{f:?}"),
            TokenKind::Str(_) => "text literal".into(),
            TokenKind::Op(op) => format!("'{op}'"),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::LBracket => "'['".into(),
            TokenKind::RBracket => "']'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Colon => "':'".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn next_token(&mut self) -> Result<Token> {
        while self.peek(0).is_some_and(char::is_whitespace) {
            self.bump();
        }
        let offset = self.pos;
        let Some(c) = self.peek(0) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };
        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '\'' => TokenKind::Str(self.quoted('\'')?),
            '"' => TokenKind::QuotedIdent(self.quoted('"')?),
            '=' | '!' | '<' | '>' => self.operator()?,
            '-' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
            '-' if self.word_at(1) == "inf" => {
                self.pos += "-inf".len();
                TokenKind::Float(f64::NEG_INFINITY)
            }
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.ident(),
            other => {
                return Err(PlanError::syntax(
                    offset,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        Ok(Token { kind, offset })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn operator(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let two: String = self.input[self.pos..].chars().take(2).collect();
        let len = if matches!(two.as_str(), "==" | "!=" | "<>" | "<=" | ">=") {
            2
        } else {
            1
        };
        let text = &self.input[start..start + len];
        let op = text
            .parse::<CmpOp>()
            .map_err(|_| PlanError::syntax(start, format!("unknown operator '{text}'")))?;
        self.pos += len;
        Ok(TokenKind::Op(op))
    }

    fn number(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        if self.peek(0) == Some('-') {
            self.bump();
        }
        let mut is_float = false;
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let digit_at = if matches!(self.peek(1), Some('+' | '-')) { 2 } else { 1 };
            if self.peek(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..digit_at {
                    self.bump();
                }
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        let text = &self.input[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|e| PlanError::syntax(start, format!("bad float '{text}': {e}")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|e| PlanError::syntax(start, format!("bad integer '{text}': {e}")))
        }
    }

    /// The identifier-like run starting `offset` chars ahead, without consuming it.
    fn word_at(&self, offset: usize) -> &'a str {
        let rest = self.input[self.pos..]
            .char_indices()
            .nth(offset)
            .map_or("", |(i, _)| &self.input[self.pos + i..]);
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn ident(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        TokenKind::Ident(self.input[start..self.pos].to_string())
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(PlanError::syntax(start, "unterminated quoted string"));
                }
                Some(c) if c == quote => {
                    if self.peek(0) == Some(quote) {
                        self.bump();
                        out.push(quote);
                    } else {
                        return Ok(out);
                    }
                }
                Some('\\') => match self.bump() {
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some(other) => {
                        return Err(PlanError::syntax(
                            self.pos - other.len_utf8() - 1,
                            format!("unknown escape '\\{other}'"),
                        ))
                    }
                    None => {
                        return Err(PlanError::syntax(start, "unterminated quoted string"));
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }
}
