//! Indentation-nested `key: value` documents.
//!
//! Each line is `key: value` or a `- item` list entry. Nesting is carried by
//! indentation in steps of exactly two spaces: a key with an empty value
//! opens a scope one level deeper, and a shallower line closes scopes back to
//! its own level. Values are stored raw, quotes included.
//!
//! A run of `- item` lines under an empty-valued key becomes one property at
//! that key: every item is double-quoted (unless it is a bare `${...}`
//! reference) and the items are joined with commas.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::ConfigError;
use crate::store::PropertyStore;

use super::{ParseContext, dotted_key};

/// A list item made only of `${...}` references is stored unquoted.
static REFERENCE_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{[[:alnum:].$\{\}]+\}$").expect("Invalid regex pattern"));

const INDENT: usize = 2;

struct PendingList {
    key: String,
    items: Vec<String>,
}

pub(super) fn parse(text: &str, ctx: &ParseContext) -> Result<PropertyStore, ConfigError> {
    let mut store = ctx.new_store();
    let mut parents: Vec<String> = Vec::new();
    // The top of `parents` was opened by the previous key line and has no
    // children yet, so a list may attach to it.
    let mut open_key = false;
    let mut list: Option<PendingList> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = strip_comment(raw);
        if content.trim().is_empty() {
            continue;
        }
        let indent = indentation(content, line)?;
        let body = &content[indent..];

        if let Some(item) = body
            .strip_prefix('-')
            .filter(|rest| rest.is_empty() || rest.starts_with(' '))
        {
            let item = item.trim();
            let item = if REFERENCE_ITEM.is_match(item) {
                item.to_string()
            } else {
                format!("\"{item}\"")
            };
            match list.as_mut() {
                Some(pending) => pending.items.push(item),
                None if open_key => {
                    let local = parents.pop().unwrap_or_default();
                    list = Some(PendingList {
                        key: dotted_key(&parents, &local),
                        items: vec![item],
                    });
                    open_key = false;
                }
                None => {
                    return Err(ConfigError::structural(line, "list item without a key"));
                }
            }
            continue;
        }

        if let Some(pending) = list.take() {
            store.set(pending.key, pending.items.join(","));
        }

        let Some((key, value)) = body.split_once(':') else {
            return Err(ConfigError::structural(
                line,
                format!("missing ':' in '{}'", body.trim()),
            ));
        };
        if indent % INDENT != 0 {
            return Err(ConfigError::structural(
                line,
                format!("indentation of {indent} is not a multiple of {INDENT} spaces"),
            ));
        }
        let level = indent / INDENT;
        if level > parents.len() {
            return Err(ConfigError::structural(line, "unexpected indentation"));
        }
        parents.truncate(level);

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::structural(line, "missing key before ':'"));
        }
        let value = value.trim();
        if value.is_empty() {
            parents.push(key.to_string());
            open_key = true;
        } else {
            store.set(dotted_key(&parents, key), value);
            open_key = false;
        }
    }

    if let Some(pending) = list.take() {
        store.set(pending.key, pending.items.join(","));
    }
    Ok(store)
}

/// Count leading spaces. Tabs are not allowed in indentation.
fn indentation(content: &str, line: usize) -> Result<usize, ConfigError> {
    let mut count = 0;
    for c in content.chars() {
        match c {
            ' ' => count += 1,
            '\t' => return Err(ConfigError::lexical(line, "tab character in indentation")),
            _ => break,
        }
    }
    Ok(count)
}

/// Cut a `#` comment that starts the line or follows whitespace, outside
/// quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev_blank = true;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' && prev_blank => return &line[..i],
            None => {}
        }
        prev_blank = c == ' ' || c == '\t';
    }
    line
}
