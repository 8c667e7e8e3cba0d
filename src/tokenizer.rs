//! Character-level scanner shared by the brace-nested parsers.
//!
//! The tokenizer classifies input into words, quoted strings, single
//! punctuation characters, blank runs and line ends. What counts as a word
//! character, whether blank runs are reported and which comment styles are
//! recognized is controlled by a [`Syntax`]. Parsers consume tokens through a
//! [`Cursor`], which buffers lookahead instead of pushing tokens back.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::ConfigError;

/// Scanner configuration for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syntax {
    /// Characters that extend a word in addition to ASCII letters and digits.
    pub word_chars: &'static str,
    /// Report each run of spaces and tabs as a single [`Token::Blank`].
    pub blanks: bool,
    /// `#` starts a comment at line start or after whitespace.
    pub hash_comments: bool,
    /// `//` starts a comment at line start or after whitespace.
    pub slash_comments: bool,
}

impl Syntax {
    pub const HOCON: Syntax = Syntax {
        word_chars: "_",
        blanks: true,
        hash_comments: true,
        slash_comments: true,
    };

    pub const JSON: Syntax = Syntax {
        word_chars: "_",
        blanks: false,
        hash_comments: true,
        slash_comments: true,
    };

    /// The JSON codec: numbers with their sign, fraction and exponent scan
    /// as one word.
    pub const JSON_TREE: Syntax = Syntax {
        word_chars: "_-+.",
        blanks: false,
        hash_comments: false,
        slash_comments: false,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Quoted { quote: char, text: String },
    Char(char),
    Blank,
    Eol,
    Eof,
}

/// A token and the 1-based line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    syntax: Syntax,
    line: usize,
    at_boundary: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, syntax: Syntax) -> Self {
        Self {
            chars: input.chars().peekable(),
            syntax,
            line: 1,
            at_boundary: true,
        }
    }

    fn is_word_char(&self, c: char) -> bool {
        c.is_alphanumeric() || self.syntax.word_chars.contains(c)
    }

    fn lexeme(&self, token: Token) -> Lexeme {
        Lexeme {
            token,
            line: self.line,
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            self.chars.next();
        }
    }

    fn comment_ahead(&self, c: char) -> bool {
        if !self.at_boundary {
            return false;
        }
        match c {
            '#' => self.syntax.hash_comments,
            '/' if self.syntax.slash_comments => {
                let mut rest = self.chars.clone();
                rest.next();
                rest.peek() == Some(&'/')
            }
            _ => false,
        }
    }

    pub fn next_token(&mut self) -> Result<Lexeme, ConfigError> {
        loop {
            let Some(&c) = self.chars.peek() else {
                return Ok(self.lexeme(Token::Eof));
            };

            if c == '\n' || c == '\r' {
                self.chars.next();
                if c == '\r' && self.chars.peek() == Some(&'\n') {
                    self.chars.next();
                }
                let lexeme = self.lexeme(Token::Eol);
                self.line += 1;
                self.at_boundary = true;
                return Ok(lexeme);
            }

            if c == ' ' || c == '\t' {
                while matches!(self.chars.peek(), Some(' ') | Some('\t')) {
                    self.chars.next();
                }
                self.at_boundary = true;
                if self.syntax.blanks {
                    return Ok(self.lexeme(Token::Blank));
                }
                continue;
            }

            if self.comment_ahead(c) {
                self.skip_comment();
                continue;
            }

            if c.is_control() {
                return Err(ConfigError::lexical(
                    self.line,
                    format!("unexpected control character U+{:04X}", c as u32),
                ));
            }

            self.at_boundary = false;

            if c == '"' || c == '\'' {
                self.chars.next();
                return self.quoted(c);
            }

            if self.is_word_char(c) {
                let mut word = String::new();
                while let Some(&c) = self.chars.peek() {
                    if !self.is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    self.chars.next();
                }
                return Ok(self.lexeme(Token::Word(word)));
            }

            self.chars.next();
            return Ok(self.lexeme(Token::Char(c)));
        }
    }

    fn quoted(&mut self, quote: char) -> Result<Lexeme, ConfigError> {
        let mut text = String::new();
        loop {
            match self.chars.next() {
                None | Some('\n') | Some('\r') => {
                    return Err(ConfigError::lexical(
                        self.line,
                        format!("unterminated {quote} string"),
                    ));
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('u') => {
                        let hex: String = self.chars.by_ref().take(4).collect();
                        match u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                        {
                            Some(decoded) => text.push(decoded),
                            None => {
                                text.push('u');
                                text.push_str(&hex);
                            }
                        }
                    }
                    Some(other) => text.push(other),
                    None => {
                        return Err(ConfigError::lexical(
                            self.line,
                            format!("unterminated {quote} string"),
                        ));
                    }
                },
                Some(c) => text.push(c),
            }
        }
        Ok(self.lexeme(Token::Quoted { quote, text }))
    }
}

/// Lookahead buffer over a [`Tokenizer`].
pub struct Cursor<'a> {
    tokenizer: Tokenizer<'a>,
    lookahead: VecDeque<Lexeme>,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str, syntax: Syntax) -> Self {
        Self {
            tokenizer: Tokenizer::new(input, syntax),
            lookahead: VecDeque::new(),
        }
    }

    pub fn peek(&mut self) -> Result<&Lexeme, ConfigError> {
        self.peek_nth(0)
    }

    /// Look `n` tokens ahead without consuming anything.
    pub fn peek_nth(&mut self, n: usize) -> Result<&Lexeme, ConfigError> {
        while self.lookahead.len() <= n {
            let lexeme = self.tokenizer.next_token()?;
            self.lookahead.push_back(lexeme);
        }
        Ok(&self.lookahead[n])
    }

    pub fn next(&mut self) -> Result<Lexeme, ConfigError> {
        match self.lookahead.pop_front() {
            Some(lexeme) => Ok(lexeme),
            None => self.tokenizer.next_token(),
        }
    }
}

/// Render the token stream of `input` one token per line, for debugging.
pub fn dump(input: &str, syntax: Syntax) -> Result<String, ConfigError> {
    let mut tokenizer = Tokenizer::new(input, syntax);
    let mut out = String::new();
    loop {
        let lexeme = tokenizer.next_token()?;
        let _ = match lexeme.token {
            Token::Eof => break,
            Token::Eol => writeln!(out, "<EOL/>"),
            Token::Blank => writeln!(out, "<blank/>"),
            Token::Word(w) => writeln!(out, "<word>{w}</word>"),
            Token::Quoted { quote: '\'', text } => writeln!(out, "<char>{text}</char>"),
            Token::Quoted { text, .. } => writeln!(out, "<string>{text}</string>"),
            Token::Char(c) => writeln!(out, "<token>{c}</token>"),
        };
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str, syntax: Syntax) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(input, syntax);
        let mut out = Vec::new();
        loop {
            let lexeme = tokenizer.next_token().unwrap();
            if lexeme.token == Token::Eof {
                return out;
            }
            out.push(lexeme.token);
        }
    }

    fn word(w: &str) -> Token {
        Token::Word(w.into())
    }

    #[test]
    fn words_chars_and_blanks() {
        let toks = tokens("local = en-US\n", Syntax::HOCON);
        assert_eq!(
            toks,
            vec![
                word("local"),
                Token::Blank,
                Token::Char('='),
                Token::Blank,
                word("en"),
                Token::Char('-'),
                word("US"),
                Token::Eol,
            ]
        );
    }

    #[test]
    fn blanks_suppressed_for_json() {
        let toks = tokens("a : b", Syntax::JSON);
        assert_eq!(toks, vec![word("a"), Token::Char(':'), word("b")]);
    }

    #[test]
    fn quoted_strings_keep_content() {
        let toks = tokens(r#"mem = "abc = 123" 'x'"#, Syntax::JSON);
        assert_eq!(
            toks,
            vec![
                word("mem"),
                Token::Char('='),
                Token::Quoted {
                    quote: '"',
                    text: "abc = 123".into()
                },
                Token::Quoted {
                    quote: '\'',
                    text: "x".into()
                },
            ]
        );
    }

    #[test]
    fn escapes_inside_quotes() {
        let toks = tokens(r#""a\"b\n""#, Syntax::JSON);
        assert_eq!(
            toks,
            vec![Token::Quoted {
                quote: '"',
                text: "a\"b\n".into()
            }]
        );
    }

    #[test]
    fn unicode_escapes() {
        let toks = tokens(r#""caf\u00e9" "C:\users""#, Syntax::JSON_TREE);
        assert_eq!(
            toks,
            vec![
                Token::Quoted {
                    quote: '"',
                    text: "café".into()
                },
                Token::Quoted {
                    quote: '"',
                    text: "C:users".into()
                },
            ]
        );
    }

    #[test]
    fn json_tree_numbers_are_single_words() {
        let toks = tokens("[-1.5e+3, 42]", Syntax::JSON_TREE);
        assert_eq!(
            toks,
            vec![
                Token::Char('['),
                word("-1.5e+3"),
                Token::Char(','),
                word("42"),
                Token::Char(']'),
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let toks = tokens("# one\na // two\n// three", Syntax::HOCON);
        assert_eq!(toks, vec![Token::Eol, word("a"), Token::Blank, Token::Eol]);
    }

    #[test]
    fn slashes_inside_a_value_are_not_comments() {
        let toks = tokens("http://x", Syntax::JSON);
        assert_eq!(
            toks,
            vec![
                word("http"),
                Token::Char(':'),
                Token::Char('/'),
                Token::Char('/'),
                word("x"),
            ]
        );
    }

    #[test]
    fn line_numbers_advance_on_eol() {
        let mut tokenizer = Tokenizer::new("a\r\nb\n", Syntax::JSON);
        assert_eq!(tokenizer.next_token().unwrap().line, 1);
        assert_eq!(tokenizer.next_token().unwrap().line, 1);
        let b = tokenizer.next_token().unwrap();
        assert_eq!(b.token, word("b"));
        assert_eq!(b.line, 2);
    }

    #[test]
    fn unterminated_quote_is_lexical() {
        let mut tokenizer = Tokenizer::new("a=\"open\nb", Syntax::HOCON);
        assert_eq!(tokenizer.next_token().unwrap().token, word("a"));
        assert_eq!(tokenizer.next_token().unwrap().token, Token::Char('='));
        let err = tokenizer.next_token().unwrap_err();
        assert!(matches!(err, ConfigError::Lexical { line: 1, .. }));
    }

    #[test]
    fn control_character_is_lexical() {
        let mut tokenizer = Tokenizer::new("a\u{0001}", Syntax::JSON);
        tokenizer.next_token().unwrap();
        assert!(matches!(
            tokenizer.next_token(),
            Err(ConfigError::Lexical { .. })
        ));
    }

    #[test]
    fn cursor_lookahead_does_not_consume() {
        let mut cursor = Cursor::new("$ { x", Syntax::JSON);
        assert_eq!(cursor.peek().unwrap().token, Token::Char('$'));
        assert_eq!(cursor.peek_nth(1).unwrap().token, Token::Char('{'));
        assert_eq!(cursor.next().unwrap().token, Token::Char('$'));
        assert_eq!(cursor.next().unwrap().token, Token::Char('{'));
        assert_eq!(cursor.next().unwrap().token, word("x"));
        assert_eq!(cursor.next().unwrap().token, Token::Eof);
        assert_eq!(cursor.next().unwrap().token, Token::Eof);
    }

    #[test]
    fn dump_renders_one_token_per_line() {
        let out = dump("a = \"b\"\n", Syntax::JSON).unwrap();
        assert_eq!(out, "<word>a</word>\n<token>=</token>\n<string>b</string>\n<EOL/>\n");
    }
}
