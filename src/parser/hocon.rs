//! Brace-nested `key = value` documents.
//!
//! A line is a key followed by `=` or `:` and a value running to the end of
//! the line. `key {` opens a scope and `}` closes it. Bare words in a value
//! are joined with single spaces, quoted segments are copied verbatim and a
//! `${...}` span is copied through untouched, braces included.
//!
//! `include classpath(..)`, `include file(..)` and `include url(..)` on a
//! line of their own merge another document: directly at top level, or with
//! the open scopes prepended to every included key.

use crate::error::ConfigError;
use crate::resource::IncludeDirective;
use crate::store::PropertyStore;
use crate::tokenizer::{Cursor, Syntax, Token};

use super::{ParseContext, dotted_key};

const INCLUDE: &str = "include";

pub(super) fn parse(text: &str, ctx: &ParseContext) -> Result<PropertyStore, ConfigError> {
    HoconParser {
        cursor: Cursor::new(text, Syntax::HOCON),
        ctx,
        store: ctx.new_store(),
        parents: Vec::new(),
        key: String::new(),
        separated: false,
        value: String::new(),
        ref_depth: 0,
    }
    .run()
}

struct HoconParser<'a, 'c> {
    cursor: Cursor<'a>,
    ctx: &'c ParseContext,
    store: PropertyStore,
    parents: Vec<String>,
    key: String,
    /// A `=` or `:` has been seen; tokens now belong to the value.
    separated: bool,
    value: String,
    /// Open `${` spans in the value.
    ref_depth: usize,
}

impl HoconParser<'_, '_> {
    fn run(mut self) -> Result<PropertyStore, ConfigError> {
        loop {
            let lexeme = self.cursor.next()?;
            let line = lexeme.line;
            match lexeme.token {
                Token::Eof => {
                    self.end_line(line)?;
                    if !self.parents.is_empty() {
                        return Err(ConfigError::structural(
                            line,
                            format!("unexpected end of input: {} unclosed scope(s)", self.parents.len()),
                        ));
                    }
                    return Ok(self.store);
                }
                Token::Eol => self.end_line(line)?,
                token if self.separated => self.value_token(token, line)?,
                token => self.key_token(token, line)?,
            }
        }
    }

    fn key_token(&mut self, token: Token, line: usize) -> Result<(), ConfigError> {
        match token {
            Token::Word(word) => {
                if self.key.is_empty() && word == INCLUDE && self.directive_follows()? {
                    return self.include(line);
                }
                self.key.push_str(&word);
            }
            Token::Quoted { text, .. } => self.key.push_str(&text),
            Token::Char(c @ ('.' | '-')) => self.key.push(c),
            Token::Blank => {}
            Token::Char(',') if self.key.is_empty() => {}
            Token::Char('=' | ':') => {
                if self.key.is_empty() {
                    return Err(ConfigError::structural(line, "missing key before separator"));
                }
                self.separated = true;
            }
            Token::Char('{') => self.open_scope(),
            Token::Char('}') => {
                if !self.key.is_empty() {
                    return Err(ConfigError::structural(
                        line,
                        format!("key '{}' has no value", self.key),
                    ));
                }
                self.close_scope(line)?;
            }
            Token::Char(c) => {
                return Err(ConfigError::structural(line, format!("unexpected '{c}' in key")));
            }
            Token::Eol | Token::Eof => {}
        }
        Ok(())
    }

    fn value_token(&mut self, token: Token, line: usize) -> Result<(), ConfigError> {
        match token {
            Token::Word(word) => self.value.push_str(&word),
            Token::Quoted { text, .. } => self.value.push_str(&text),
            Token::Blank => {
                if !self.value.is_empty() {
                    self.value.push(' ');
                }
            }
            Token::Char('$') if self.cursor.peek()?.token == Token::Char('{') => {
                self.cursor.next()?;
                self.value.push_str("${");
                self.ref_depth += 1;
            }
            Token::Char('{') if self.ref_depth > 0 => {
                self.value.push('{');
                self.ref_depth += 1;
            }
            Token::Char('}') if self.ref_depth > 0 => {
                self.value.push('}');
                self.ref_depth -= 1;
            }
            Token::Char('{') => {
                if !self.value.trim().is_empty() {
                    return Err(ConfigError::structural(line, "unexpected '{' after a value"));
                }
                self.open_scope();
            }
            Token::Char('}') => {
                self.store_value();
                self.close_scope(line)?;
            }
            Token::Char(c) => self.value.push(c),
            Token::Eol | Token::Eof => {}
        }
        Ok(())
    }

    fn open_scope(&mut self) {
        self.parents.push(std::mem::take(&mut self.key));
        self.separated = false;
        self.value.clear();
    }

    fn close_scope(&mut self, line: usize) -> Result<(), ConfigError> {
        if self.parents.pop().is_none() {
            return Err(ConfigError::structural(line, "unexpected '}' with no open scope"));
        }
        Ok(())
    }

    fn store_value(&mut self) {
        let key = dotted_key(&self.parents, &self.key);
        let value = self.value.trim().to_string();
        self.store.set(key, value);
        self.key.clear();
        self.value.clear();
        self.separated = false;
        self.ref_depth = 0;
    }

    fn end_line(&mut self, line: usize) -> Result<(), ConfigError> {
        if self.separated {
            self.store_value();
        } else if !self.key.is_empty() {
            return Err(ConfigError::structural(
                line,
                format!("missing '=' after key '{}'", self.key),
            ));
        }
        Ok(())
    }

    /// `include` starts a directive when the next non-blank token is a word.
    fn directive_follows(&mut self) -> Result<bool, ConfigError> {
        let mut n = 0;
        loop {
            match &self.cursor.peek_nth(n)?.token {
                Token::Blank => n += 1,
                Token::Word(_) => return Ok(true),
                _ => return Ok(false),
            }
        }
    }

    fn include(&mut self, line: usize) -> Result<(), ConfigError> {
        let mut raw = String::new();
        loop {
            match self.cursor.peek()?.token {
                Token::Eol | Token::Eof => break,
                _ => {}
            }
            match self.cursor.next()?.token {
                Token::Word(word) => raw.push_str(&word),
                Token::Quoted { text, .. } => raw.push_str(&text),
                Token::Char(c) => raw.push(c),
                _ => {}
            }
        }
        let directive = IncludeDirective::parse(&raw).ok_or_else(|| {
            ConfigError::structural(line, format!("malformed include directive '{raw}'"))
        })?;
        let included = self.ctx.include(&directive)?;
        tracing::debug!(resource = directive.target(), count = included.len(), "merged include");

        if self.parents.iter().all(String::is_empty) {
            self.store.insert_all(included.iter());
        } else {
            for (key, value) in included.iter() {
                self.store.set(dotted_key(&self.parents, key), value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::parse_str;
    use crate::resource::ResourceLoader;
    use crate::types::{Format, SearchPath};
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = "# HOCON Comment
setting {
  local = en-US
}

app {
  sample {
    local = ${setting.local}
    url = \"http://www.abc.com/\"
    mem = \"abc = 123\"
    cost = 1080
    values = 1, 2, 3
    array = \"a\", \"b\", \"c\"
    date = 2016/09/16
    time = 09:15
    datetime = 2016/09/16 09:15
    nested {
       name = child
       threshold = 1.4
    }
  }
}
// HOCON Comment

";

    fn hocon(text: &str) -> Result<PropertyStore, ConfigError> {
        parse_str(text, Format::Hocon)
    }

    #[test]
    fn nested_document_flattens_to_twelve_keys() {
        let store = hocon(SAMPLE).unwrap();
        assert_eq!(store.len(), 12);
        assert_eq!(store.get("setting.local"), Some("en-US"));
        assert_eq!(store.get("app.sample.local"), Some("${setting.local}"));
        assert_eq!(store.get("app.sample.url"), Some("http://www.abc.com/"));
        assert_eq!(store.get("app.sample.mem"), Some("abc = 123"));
        assert_eq!(store.get("app.sample.cost"), Some("1080"));
        assert_eq!(store.get("app.sample.values"), Some("1, 2, 3"));
        assert_eq!(store.get("app.sample.array"), Some("a, b, c"));
        assert_eq!(store.get("app.sample.date"), Some("2016/09/16"));
        assert_eq!(store.get("app.sample.time"), Some("09:15"));
        assert_eq!(store.get("app.sample.datetime"), Some("2016/09/16 09:15"));
        assert_eq!(store.get("app.sample.nested.name"), Some("child"));
        assert_eq!(store.get("app.sample.nested.threshold"), Some("1.4"));
    }

    #[test]
    fn keys_keep_document_order() {
        let store = hocon(SAMPLE).unwrap();
        let keys: Vec<_> = store.keys().collect();
        assert_eq!(keys[0], "setting.local");
        assert_eq!(keys[1], "app.sample.local");
        assert_eq!(keys[11], "app.sample.nested.threshold");
    }

    #[test]
    fn dotted_and_colon_keys() {
        let store = hocon("a.b.c : 1\nx-y = z\n").unwrap();
        assert_eq!(store.get("a.b.c"), Some("1"));
        assert_eq!(store.get("x-y"), Some("z"));
    }

    #[test]
    fn nested_references_copied_through() {
        let store = hocon("k = ${${a.b}.${x.y}} and ${p,default value}\n").unwrap();
        assert_eq!(store.get("k"), Some("${${a.b}.${x.y}} and ${p,default value}"));
    }

    #[test]
    fn inline_scope_closes_on_same_line() {
        let store = hocon("a { b = 1 }\nc = 2\n").unwrap();
        assert_eq!(store.get("a.b"), Some("1"));
        assert_eq!(store.get("c"), Some("2"));
    }

    #[test]
    fn separator_before_brace_opens_scope() {
        let store = hocon("a = {\n  b = 1\n}\n").unwrap();
        assert_eq!(store.get("a.b"), Some("1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unclosed_scope_is_structural() {
        let err = hocon("a {\n b = 1\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(err.to_string().contains("unclosed"));
    }

    #[test]
    fn stray_close_is_structural() {
        let err = hocon("a = 1\n}\n").unwrap_err();
        assert!(matches!(err, ConfigError::Structural { line: 2, .. }));
    }

    #[test]
    fn key_without_separator_is_structural() {
        let err = hocon("lonely\n").unwrap_err();
        assert!(matches!(err, ConfigError::Structural { line: 1, .. }));
    }

    #[test]
    fn include_is_usable_as_a_key() {
        let store = hocon("include = yes\n").unwrap();
        assert_eq!(store.get("include"), Some("yes"));
    }

    #[test]
    fn malformed_include_is_structural() {
        let err = hocon("include resource(x.conf)\n").unwrap_err();
        assert!(matches!(err, ConfigError::Structural { line: 1, .. }));
    }

    fn loader_for(dir: &TempDir) -> ResourceLoader {
        ResourceLoader::new(&[SearchPath::Path(dir.path().to_path_buf())], "test")
    }

    #[test]
    fn top_level_include_merges_directly() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("other.conf"), "pay = payment\nweb { port = 80 }\n").unwrap();
        let ctx = ParseContext::new().loader(loader_for(&dir));
        let store = crate::parser::parse(
            "include classpath(other.conf)\nlocal = here\n",
            Format::Hocon,
            &ctx,
        )
        .unwrap();
        assert_eq!(store.get("pay"), Some("payment"));
        assert_eq!(store.get("web.port"), Some("80"));
        assert_eq!(store.get("local"), Some("here"));
    }

    #[test]
    fn nested_include_prefixes_keys() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ui.json"), "bar : {\n  baz : \"value1\"\n}\n").unwrap();
        let ctx = ParseContext::new().loader(loader_for(&dir));
        let store = crate::parser::parse(
            "foo {\n  ui {\n    include classpath(ui.json)\n  }\n}\n",
            Format::Hocon,
            &ctx,
        )
        .unwrap();
        assert_eq!(store.get("foo.ui.bar.baz"), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_include_resolves_next_to_including_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("conf")).unwrap();
        fs::write(dir.path().join("conf").join("db.properties"), "url=pg://\n").unwrap();
        let ctx = ParseContext::new().source("app.conf", Some(dir.path().to_path_buf()));
        let store = crate::parser::parse(
            "database {\n  include file(conf/db.properties)\n}\n",
            Format::Hocon,
            &ctx,
        )
        .unwrap();
        assert_eq!(store.get("database.url"), Some("pg://"));
    }

    #[test]
    fn missing_include_aborts_parse() {
        let dir = TempDir::new().unwrap();
        let ctx = ParseContext::new().loader(loader_for(&dir));
        let err = crate::parser::parse("include classpath(nope.conf)\n", Format::Hocon, &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn self_include_hits_depth_limit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("loop.conf"), "include classpath(loop.conf)\n").unwrap();
        let ctx = ParseContext::new().loader(loader_for(&dir));
        let err = crate::parser::parse("include classpath(loop.conf)\n", Format::Hocon, &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }
}
