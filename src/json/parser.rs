//! Recursive-descent parser from JSON text to a [`Value`] tree.
//!
//! Slightly relaxed: a trailing comma before `]` or `}` is accepted, object
//! keys may be bare words, and a bare word that is not a number, boolean or
//! `null` is read as a string.

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::tokenizer::{Cursor, Lexeme, Syntax, Token};
use crate::value::Value;

/// Deepest nesting of arrays and objects accepted.
pub const MAX_DEPTH: usize = 128;

pub fn parse(text: &str) -> Result<Value, ConfigError> {
    let mut parser = Parser {
        cursor: Cursor::new(text, Syntax::JSON_TREE),
        depth: 0,
    };
    if parser.peek()?.token == Token::Eof {
        return Ok(Value::Null);
    }
    let value = parser.value()?;
    let rest = parser.next()?;
    if rest.token != Token::Eof {
        return Err(ConfigError::structural(
            rest.line,
            "unexpected content after the JSON value",
        ));
    }
    Ok(value)
}

struct Parser<'a> {
    cursor: Cursor<'a>,
    /// Arrays and objects currently open.
    depth: usize,
}

impl Parser<'_> {
    /// Next significant token. Line ends carry no meaning in JSON.
    fn next(&mut self) -> Result<Lexeme, ConfigError> {
        loop {
            let lexeme = self.cursor.next()?;
            if lexeme.token != Token::Eol {
                return Ok(lexeme);
            }
        }
    }

    fn peek(&mut self) -> Result<&Lexeme, ConfigError> {
        while self.cursor.peek()?.token == Token::Eol {
            self.cursor.next()?;
        }
        self.cursor.peek()
    }

    fn value(&mut self) -> Result<Value, ConfigError> {
        let lexeme = self.next()?;
        match lexeme.token {
            Token::Char(open @ ('{' | '[')) => {
                if self.depth >= MAX_DEPTH {
                    return Err(ConfigError::structural(
                        lexeme.line,
                        format!("nesting deeper than {MAX_DEPTH}"),
                    ));
                }
                self.depth += 1;
                let nested = if open == '{' {
                    self.object()
                } else {
                    self.array()
                };
                self.depth -= 1;
                nested
            }
            Token::Quoted { text, .. } => Ok(Value::Str(text)),
            Token::Word(word) => Ok(scalar(word)),
            Token::Eof => Err(ConfigError::structural(
                lexeme.line,
                "unexpected end of input, expected a value",
            )),
            other => Err(ConfigError::structural(
                lexeme.line,
                format!("expected a value, found {}", describe(&other)),
            )),
        }
    }

    fn object(&mut self) -> Result<Value, ConfigError> {
        let mut map = IndexMap::new();
        loop {
            let lexeme = self.next()?;
            let key = match lexeme.token {
                Token::Char('}') => return Ok(Value::Map(map)),
                Token::Quoted { text, .. } | Token::Word(text) => text,
                other => {
                    return Err(ConfigError::structural(
                        lexeme.line,
                        format!("expected an object key, found {}", describe(&other)),
                    ));
                }
            };
            let separator = self.next()?;
            if separator.token != Token::Char(':') {
                return Err(ConfigError::structural(
                    separator.line,
                    format!("expected ':' after key '{key}'"),
                ));
            }
            let value = self.value()?;
            map.insert(key, value);

            let lexeme = self.next()?;
            match lexeme.token {
                Token::Char(',') => {}
                Token::Char('}') => return Ok(Value::Map(map)),
                other => {
                    return Err(ConfigError::structural(
                        lexeme.line,
                        format!("expected ',' or '}}', found {}", describe(&other)),
                    ));
                }
            }
        }
    }

    fn array(&mut self) -> Result<Value, ConfigError> {
        let mut items = Vec::new();
        loop {
            if self.peek()?.token == Token::Char(']') {
                self.next()?;
                return Ok(Value::List(items));
            }
            items.push(self.value()?);

            let lexeme = self.next()?;
            match lexeme.token {
                Token::Char(',') => {}
                Token::Char(']') => return Ok(Value::List(items)),
                other => {
                    return Err(ConfigError::structural(
                        lexeme.line,
                        format!("expected ',' or ']', found {}", describe(&other)),
                    ));
                }
            }
        }
    }
}

fn scalar(word: String) -> Value {
    match word.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    let mut chars = word.chars();
    let numeric = match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };
    if numeric {
        if let Ok(i) = word.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = word.parse::<f64>() {
            return Value::Float(f);
        }
    }
    Value::Str(word)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(w) => format!("'{w}'"),
        Token::Quoted { text, .. } => format!("\"{text}\""),
        Token::Char(c) => format!("'{c}'"),
        Token::Blank => "whitespace".to_string(),
        Token::Eol => "end of line".to_string(),
        Token::Eof => "end of input".to_string(),
    }
}
