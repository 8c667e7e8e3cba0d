//! Coercion of stored strings and value trees into typed values.
//!
//! [`ValueDeserializer`] is a `serde::Deserializer` over a [`Value`]. When a
//! target asks for a number, a boolean or a collection and finds a string,
//! the string is coerced:
//!
//! - booleans accept `true`/`false`, `yes`/`no` and `1`/`0`, case-insensitively
//! - numbers use the standard parsers; a float bound to an integer truncates
//!   and an integer bound to a float widens
//! - sequences split a string on top-level commas via [`split_list`]
//! - maps and structs accept a string holding a JSON object
//! - enums match variant names case-sensitively
//!
//! Errors record the path of the failing node so the object mapper can drop
//! just that field and retry.

use std::fmt::{self, Display};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};

use crate::error::ConfigError;
use crate::value::Value;

/// One step into a value tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSegment {
    Key(String),
    Index(usize),
}

pub(crate) fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) if out.is_empty() => out.push_str(key),
            PathSegment::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{i}]")),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Conversion,
    Binding,
}

/// Deserialization failure with the path of the node that caused it.
#[derive(Debug)]
pub struct DeError {
    path: Vec<PathSegment>,
    message: String,
    failure: Failure,
}

impl DeError {
    fn conversion(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
            failure: Failure::Conversion,
        }
    }

    fn at(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    /// Path up to and including the innermost named field. Removing that
    /// node lets the enclosing struct fall back to the field's default.
    pub(crate) fn field_path(&self) -> Option<&[PathSegment]> {
        let end = self
            .path
            .iter()
            .rposition(|s| matches!(s, PathSegment::Key(_)))?;
        Some(&self.path[..=end])
    }

    pub(crate) fn into_conversion(self, value: &str, target: &str) -> ConfigError {
        ConfigError::Conversion {
            value: value.to_string(),
            target: target.to_string(),
            reason: self.to_string(),
        }
    }

    pub(crate) fn into_binding(self, target: &str) -> ConfigError {
        ConfigError::Binding {
            target: target.to_string(),
            reason: self.to_string(),
        }
    }

    pub fn is_conversion(&self) -> bool {
        self.failure == Failure::Conversion
    }
}

impl Display for DeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "at '{}': {}", display_path(&self.path), self.message)
        }
    }
}

impl std::error::Error for DeError {}

impl de::Error for DeError {
    fn custom<T: Display>(msg: T) -> Self {
        Self {
            path: Vec::new(),
            message: msg.to_string(),
            failure: Failure::Binding,
        }
    }

    fn invalid_type(unexp: de::Unexpected, exp: &dyn de::Expected) -> Self {
        Self::conversion(format!("invalid type: {unexp}, expected {exp}"))
    }

    fn invalid_value(unexp: de::Unexpected, exp: &dyn de::Expected) -> Self {
        Self::conversion(format!("invalid value: {unexp}, expected {exp}"))
    }

    fn unknown_variant(variant: &str, expected: &'static [&'static str]) -> Self {
        Self::conversion(format!(
            "unknown variant '{variant}', expected one of {expected:?}"
        ))
    }
}

/// Type name without module paths: `Vec<String>` rather than
/// `alloc::vec::Vec<alloc::string::String>`.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut start = 0;
    for (i, c) in full.char_indices() {
        if matches!(c, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';') {
            out.push_str(last_segment(&full[start..i]));
            out.push(c);
            start = i + c.len_utf8();
        }
    }
    out.push_str(last_segment(&full[start..]));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Convert one stored string to `T`.
///
/// ```
/// let flags: Vec<bool> = polyconf::convert("yes, No, 1").unwrap();
/// assert_eq!(flags, vec![true, false, true]);
/// ```
pub fn convert<T: DeserializeOwned>(raw: &str) -> Result<T, ConfigError> {
    T::deserialize(ValueDeserializer::new(Value::Str(raw.to_string())))
        .map_err(|e| e.into_conversion(raw, &short_type_name::<T>()))
}

/// Strip one pair of matching outer quotes. Unquoted text is returned as-is.
pub(crate) fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    raw
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Split a delimited list into trimmed, unquoted elements.
///
/// One pair of brackets enclosing the whole text is removed first. Commas
/// nested in `[...]` or `{...}`, or inside a quoted element, do not split.
pub fn split_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let body = if encloses(trimmed) {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    if body.trim().is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut at_start = true;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if at_start => quote = Some(c),
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(unquote(&body[start..i]).trim().to_string());
                start = i + 1;
                at_start = true;
                continue;
            }
            _ => {}
        }
        if !c.is_whitespace() {
            at_start = false;
        }
    }
    items.push(unquote(&body[start..]).trim().to_string());
    items
}

/// True when the text starts with `[` and its matching `]` is the last char.
fn encloses(text: &str) -> bool {
    if !text.starts_with('[') || !text.ends_with(']') {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return i == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn describe(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{s}'"),
        other => other.type_name().to_string(),
    }
}

fn mismatch(value: &Value, expected: &str) -> DeError {
    DeError::conversion(format!("expected {expected}, found {}", describe(value)))
}

/// A `serde::Deserializer` over an owned [`Value`].
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    fn integer<T>(&self) -> Result<T, DeError>
    where
        T: FromStr + TryFrom<i64>,
        <T as FromStr>::Err: Display,
    {
        let target = short_type_name::<T>();
        let out_of_range = |n: i64| DeError::conversion(format!("{n} is out of range for {target}"));
        match &self.value {
            Value::Int(i) => T::try_from(*i).map_err(|_| out_of_range(*i)),
            Value::Float(f) if f.is_finite() => {
                let truncated = f.trunc() as i64;
                T::try_from(truncated).map_err(|_| out_of_range(truncated))
            }
            Value::Str(s) => unquote(s)
                .trim()
                .parse::<T>()
                .map_err(|e| DeError::conversion(format!("'{s}' is not a valid {target}: {e}"))),
            other => Err(mismatch(other, &target)),
        }
    }

    fn float(&self) -> Result<f64, DeError> {
        match &self.value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Str(s) => unquote(s)
                .trim()
                .parse::<f64>()
                .map_err(|e| DeError::conversion(format!("'{s}' is not a valid number: {e}"))),
            other => Err(mismatch(other, "a number")),
        }
    }
}

fn visit_list<'de, V: Visitor<'de>>(items: Vec<Value>, visitor: V) -> Result<V::Value, DeError> {
    visitor.visit_seq(SeqDeserializer {
        iter: items.into_iter().enumerate(),
    })
}

fn visit_map<'de, V: Visitor<'de>>(
    map: IndexMap<String, Value>,
    visitor: V,
) -> Result<V::Value, DeError> {
    visitor.visit_map(MapDeserializer {
        iter: map.into_iter(),
        pending: None,
    })
}

macro_rules! integer_methods {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
                visitor.$visit(self.integer::<$ty>()?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = DeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::Float(f) => visitor.visit_f64(f),
            Value::Str(s) => visitor.visit_string(s),
            Value::List(items) => visit_list(items, visitor),
            Value::Map(map) => visit_map(map, visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match &self.value {
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Int(0) => visitor.visit_bool(false),
            Value::Int(1) => visitor.visit_bool(true),
            Value::Str(s) => match parse_bool(unquote(s)) {
                Some(b) => visitor.visit_bool(b),
                None => Err(DeError::conversion(format!(
                    "'{s}' is not a boolean (expected true/false, yes/no or 1/0)"
                ))),
            },
            other => Err(mismatch(other, "a boolean")),
        }
    }

    integer_methods! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_f32(self.float()? as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_f64(self.float()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        if let Value::Str(s) = &self.value {
            let mut chars = unquote(s).chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return visitor.visit_char(c);
            }
        }
        Err(mismatch(&self.value, "a single character"))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.value {
            Value::Str(s) => visitor.visit_string(unquote(&s).to_string()),
            scalar @ (Value::Bool(_) | Value::Int(_) | Value::Float(_)) => {
                visitor.visit_string(scalar.to_property())
            }
            other => Err(mismatch(&other, "a string")),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.value {
            Value::Str(s) => visitor.visit_byte_buf(unquote(&s).as_bytes().to_vec()),
            other => ValueDeserializer::new(other).deserialize_seq(visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        let absent = match &self.value {
            Value::Null => true,
            Value::Str(s) => s.trim() == "null",
            _ => false,
        };
        if absent {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match &self.value {
            Value::Null => visitor.visit_unit(),
            other => Err(mismatch(other, "null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DeError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.value {
            Value::List(items) => visit_list(items, visitor),
            Value::Str(s) => visit_list(
                split_list(&s).into_iter().map(Value::Str).collect(),
                visitor,
            ),
            Value::Null => visit_list(Vec::new(), visitor),
            other @ Value::Map(_) => Err(mismatch(&other, "a list")),
            scalar => visit_list(vec![scalar], visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, DeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.value {
            Value::Map(map) => visit_map(map, visitor),
            Value::Str(s) if s.trim_start().starts_with('{') => match crate::json::parse(&s) {
                Ok(Value::Map(map)) => visit_map(map, visitor),
                Ok(other) => Err(mismatch(&other, "a map")),
                Err(e) => Err(DeError::conversion(e.to_string())),
            },
            Value::Null => visit_map(IndexMap::new(), visitor),
            other => Err(mismatch(&other, "a map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        match self.value {
            Value::Str(s) => visitor.visit_enum(unquote(&s).trim().to_string().into_deserializer()),
            Value::Map(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((variant, value)), None) => {
                        visitor.visit_enum(EnumDeserializer { variant, value })
                    }
                    _ => Err(DeError::conversion(format!(
                        "expected a single-key map naming a {name} variant"
                    ))),
                }
            }
            other => Err(mismatch(&other, name)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.value {
            Value::Str(s) => visitor.visit_string(s),
            other => ValueDeserializer::new(other).deserialize_any(visitor),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_unit()
    }
}

struct SeqDeserializer {
    iter: std::iter::Enumerate<std::vec::IntoIter<Value>>,
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = DeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, DeError> {
        match self.iter.next() {
            Some((index, value)) => seed
                .deserialize(ValueDeserializer::new(value))
                .map(Some)
                .map_err(|e| e.at(PathSegment::Index(index))),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: indexmap::map::IntoIter<String, Value>,
    pending: Option<(String, Value)>,
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = DeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, DeError> {
        let Some((key, value)) = self.iter.next() else {
            return Ok(None);
        };
        let out = seed
            .deserialize(ValueDeserializer::new(Value::Str(key.clone())))
            .map_err(|e| e.at(PathSegment::Key(key.clone())))?;
        self.pending = Some((key, value));
        Ok(Some(out))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, DeError> {
        let Some((key, value)) = self.pending.take() else {
            return Err(de::Error::custom("map value requested before its key"));
        };
        seed.deserialize(ValueDeserializer::new(value))
            .map_err(|e| e.at(PathSegment::Key(key)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: Value,
}

impl<'de> EnumAccess<'de> for EnumDeserializer {
    type Error = DeError;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, VariantDeserializer), DeError> {
        let variant = seed.deserialize(ValueDeserializer::new(Value::Str(self.variant.clone())))?;
        Ok((
            variant,
            VariantDeserializer {
                variant: self.variant,
                value: self.value,
            },
        ))
    }
}

struct VariantDeserializer {
    variant: String,
    value: Value,
}

impl<'de> VariantAccess<'de> for VariantDeserializer {
    type Error = DeError;

    fn unit_variant(self) -> Result<(), DeError> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, DeError> {
        seed.deserialize(ValueDeserializer::new(self.value))
            .map_err(|e| e.at(PathSegment::Key(self.variant)))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, DeError> {
        de::Deserializer::deserialize_seq(ValueDeserializer::new(self.value), visitor)
            .map_err(|e| e.at(PathSegment::Key(self.variant)))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        de::Deserializer::deserialize_map(ValueDeserializer::new(self.value), visitor)
            .map_err(|e| e.at(PathSegment::Key(self.variant)))
    }
}
