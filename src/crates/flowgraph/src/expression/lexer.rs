//! Tokenizer for the restricted expression language

use crate::error::{EngineError, Result};

/// Lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    /// Statement separator (newline or `;`)
    Newline,
    Eof,
}

/// Keywords of a general-purpose language that have no meaning here
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "import", "from", "def", "class", "lambda", "for", "while", "if", "else", "elif", "return",
    "yield", "with", "global", "nonlocal", "del", "try", "except", "raise", "exec", "eval",
    "open", "__import__",
];

/// Split source text into tokens
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    tokens: Vec<Token>,
    depth: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source,
            tokens: Vec::new(),
            depth: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(&(pos, ch)) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.chars.next();
                }
                '#' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '\n' | ';' => {
                    self.chars.next();
                    // Line breaks inside brackets are insignificant
                    if self.depth == 0 || ch == ';' {
                        self.push_separator();
                    }
                }
                '0'..='9' => self.number(pos)?,
                '.' => {
                    let next_is_digit = self.source[pos + 1..]
                        .chars()
                        .next()
                        .map(|c| c.is_ascii_digit())
                        .unwrap_or(false);
                    let after_value = matches!(
                        self.tokens.last(),
                        Some(Token::Ident(_) | Token::RParen | Token::RBracket | Token::RBrace | Token::Str(_))
                    );
                    if next_is_digit && !after_value {
                        self.number(pos)?;
                    } else {
                        return Err(EngineError::expression(
                            "attribute access is not allowed",
                        ));
                    }
                }
                '"' | '\'' => self.string(ch)?,
                c if c.is_alphabetic() || c == '_' => self.word(pos)?,
                _ => self.operator(pos, ch)?,
            }
        }
        self.push_separator();
        self.tokens.push(Token::Eof);
        Ok(self.tokens)
    }

    fn push_separator(&mut self) {
        if !matches!(self.tokens.last(), None | Some(Token::Newline)) {
            self.tokens.push(Token::Newline);
        }
    }

    fn number(&mut self, start: usize) -> Result<()> {
        let mut end = start;
        let mut is_float = false;
        let mut seen_exponent = false;

        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                end = pos + 1;
            } else if c == '.' && !is_float && !seen_exponent {
                // `1.foo` is attribute access, `1.5` and `1.` are floats
                let next = self.source[pos + 1..].chars().next();
                if matches!(next, Some(n) if n.is_alphabetic() || n == '_') {
                    break;
                }
                is_float = true;
                end = pos + 1;
            } else if (c == 'e' || c == 'E') && !seen_exponent {
                let rest = &self.source[pos + 1..];
                let mut rest_chars = rest.chars();
                let valid = match rest_chars.next() {
                    Some(d) if d.is_ascii_digit() => true,
                    Some('+') | Some('-') => {
                        matches!(rest_chars.next(), Some(d) if d.is_ascii_digit())
                    }
                    _ => false,
                };
                if !valid {
                    break;
                }
                seen_exponent = true;
                is_float = true;
                self.chars.next();
                if let Some(&(sign_pos, sign)) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        end = sign_pos + 1;
                        self.chars.next();
                    }
                }
                continue;
            } else {
                break;
            }
            self.chars.next();
        }

        let text: String = self.source[start..end].chars().filter(|c| *c != '_').collect();
        let token = if is_float {
            Token::Float(
                text.parse()
                    .map_err(|_| EngineError::expression(format!("invalid number: {}", text)))?,
            )
        } else {
            Token::Int(text.parse().map_err(|_| {
                EngineError::expression(format!("integer literal out of range: {}", text))
            })?)
        };
        self.tokens.push(token);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<()> {
        self.chars.next();
        let mut value = String::new();
        loop {
            let (_, c) = self
                .chars
                .next()
                .ok_or_else(|| EngineError::expression("unterminated string literal"))?;
            match c {
                c if c == quote => break,
                '\\' => {
                    let (_, escaped) = self
                        .chars
                        .next()
                        .ok_or_else(|| EngineError::expression("unterminated string literal"))?;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                '\n' => return Err(EngineError::expression("unterminated string literal")),
                c => value.push(c),
            }
        }
        self.tokens.push(Token::Str(value));
        Ok(())
    }

    fn word(&mut self, start: usize) -> Result<()> {
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }

        let word = &self.source[start..end];
        let token = match word {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "true" | "True" => Token::True,
            "false" | "False" => Token::False,
            "null" | "None" => Token::Null,
            w if FORBIDDEN_KEYWORDS.contains(&w) => {
                return Err(EngineError::expression(format!("'{}' is not allowed", w)));
            }
            w if w.starts_with("__") => {
                return Err(EngineError::expression(format!(
                    "dunder names are not allowed: {}",
                    w
                )));
            }
            w => Token::Ident(w.to_string()),
        };
        self.tokens.push(token);
        Ok(())
    }

    fn operator(&mut self, pos: usize, ch: char) -> Result<()> {
        self.chars.next();
        let next = self.chars.peek().map(|&(_, c)| c);
        let take = |lexer: &mut Self, token: Token| {
            lexer.chars.next();
            token
        };

        let token = match (ch, next) {
            ('*', Some('*')) => take(self, Token::DoubleStar),
            ('*', Some('=')) => take(self, Token::StarAssign),
            ('/', Some('/')) => take(self, Token::DoubleSlash),
            ('+', Some('=')) => take(self, Token::PlusAssign),
            ('-', Some('=')) => take(self, Token::MinusAssign),
            ('=', Some('=')) => take(self, Token::Eq),
            ('!', Some('=')) => take(self, Token::Ne),
            ('<', Some('=')) => take(self, Token::Le),
            ('>', Some('=')) => take(self, Token::Ge),
            ('&', Some('&')) => take(self, Token::And),
            ('|', Some('|')) => take(self, Token::Or),
            ('+', _) => Token::Plus,
            ('-', _) => Token::Minus,
            ('*', _) => Token::Star,
            ('/', _) => Token::Slash,
            ('%', _) => Token::Percent,
            ('<', _) => Token::Lt,
            ('>', _) => Token::Gt,
            ('=', _) => Token::Assign,
            ('!', _) => Token::Not,
            (',', _) => Token::Comma,
            (':', _) => Token::Colon,
            ('(', _) | ('[', _) | ('{', _) => {
                self.depth += 1;
                match ch {
                    '(' => Token::LParen,
                    '[' => Token::LBracket,
                    _ => Token::LBrace,
                }
            }
            (')', _) | (']', _) | ('}', _) => {
                self.depth = self.depth.saturating_sub(1);
                match ch {
                    ')' => Token::RParen,
                    ']' => Token::RBracket,
                    _ => Token::RBrace,
                }
            }
            _ => {
                return Err(EngineError::expression(format!(
                    "unexpected character '{}' at position {}",
                    ch, pos
                )));
            }
        };
        self.tokens.push(token);
        Ok(())
    }
}
