//! Brace-nested documents shaped like JSON, flattened to dotted keys.
//!
//! This is not a JSON tree parser. Keys are words or quoted strings ended by
//! `:` (or `=`), `key : {` opens a scope and `}` closes it, and a value runs
//! to the end of its line with one trailing comma removed. Blanks are not
//! significant outside quotes. Bracketed lists are copied literally, so
//! `[${a}, "b"]` is stored as `[${a},b]` for the converter to split later.
//! A `{` with no key (the document's outer braces) opens an anonymous scope.

use crate::error::ConfigError;
use crate::store::PropertyStore;
use crate::tokenizer::{Cursor, Syntax, Token};

use super::{ParseContext, dotted_key};

pub(super) fn parse(text: &str, ctx: &ParseContext) -> Result<PropertyStore, ConfigError> {
    let mut cursor = Cursor::new(text, Syntax::JSON);
    let mut store = ctx.new_store();
    let mut parents: Vec<String> = Vec::new();
    let mut key = String::new();
    let mut separated = false;
    let mut value = String::new();
    let mut ref_depth = 0usize;

    loop {
        let lexeme = cursor.next()?;
        let line = lexeme.line;
        match lexeme.token {
            Token::Eof | Token::Eol => {
                if separated && !value.is_empty() {
                    store.set(dotted_key(&parents, &key), trim_value(&value));
                    key.clear();
                    value.clear();
                    separated = false;
                    ref_depth = 0;
                } else if !separated && !key.is_empty() {
                    return Err(ConfigError::structural(
                        line,
                        format!("missing ':' after key '{key}'"),
                    ));
                }
                if lexeme.token == Token::Eof {
                    if separated {
                        return Err(ConfigError::structural(
                            line,
                            format!("key '{key}' has no value"),
                        ));
                    }
                    if !parents.is_empty() {
                        return Err(ConfigError::structural(
                            line,
                            format!("unexpected end of input: {} unclosed scope(s)", parents.len()),
                        ));
                    }
                    return Ok(store);
                }
            }
            Token::Char('$') if separated && cursor.peek()?.token == Token::Char('{') => {
                cursor.next()?;
                value.push_str("${");
                ref_depth += 1;
            }
            Token::Char(c @ ('{' | '}')) if ref_depth > 0 => {
                value.push(c);
                if c == '{' {
                    ref_depth += 1;
                } else {
                    ref_depth -= 1;
                }
            }
            Token::Char('{') => {
                if separated && !value.is_empty() {
                    return Err(ConfigError::structural(line, "unexpected '{' after a value"));
                }
                parents.push(std::mem::take(&mut key));
                separated = false;
            }
            Token::Char('}') => {
                if separated && !value.is_empty() {
                    store.set(dotted_key(&parents, &key), trim_value(&value));
                } else if !key.is_empty() {
                    return Err(ConfigError::structural(
                        line,
                        format!("key '{key}' has no value"),
                    ));
                }
                key.clear();
                value.clear();
                separated = false;
                if parents.pop().is_none() {
                    return Err(ConfigError::structural(line, "unexpected '}' with no open scope"));
                }
            }
            token if separated => match token {
                Token::Word(word) => value.push_str(&word),
                Token::Quoted { text, .. } => value.push_str(&text),
                Token::Char(c) => value.push(c),
                _ => {}
            },
            Token::Word(word) => key.push_str(&word),
            Token::Quoted { text, .. } => key.push_str(&text),
            Token::Char(c @ ('.' | '-')) if !key.is_empty() => key.push(c),
            Token::Char(':' | '=') => {
                if key.is_empty() {
                    return Err(ConfigError::structural(line, "missing key before ':'"));
                }
                separated = true;
            }
            Token::Char(',') if key.is_empty() => {}
            Token::Char(c) => {
                return Err(ConfigError::structural(line, format!("unexpected '{c}' in key")));
            }
            Token::Blank => {}
        }
    }
}

/// Trim and drop one trailing comma.
fn trim_value(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(',').unwrap_or(trimmed).to_string()
}
