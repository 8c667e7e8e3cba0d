//! Full JSON text to and from [`Value`] trees and typed values.
//!
//! Unlike the flattening JSON dialect in [`crate::parser`], this codec builds
//! a real tree. Unmarshalling parses the text and hands the tree to the
//! object mapper, so typed targets get the same lenient coercions and
//! skip-and-continue field handling as configuration binding. Marshalling
//! goes through [`to_value`] and writes compact or pretty text.

mod parser;
mod ser;
pub(crate) mod writer;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ConfigError;
use crate::mapper;
use crate::value::Value;

pub use parser::{MAX_DEPTH, parse};
pub use ser::{SerError, to_value};

/// Compact JSON text for `source`.
pub fn marshal<S: Serialize + ?Sized>(source: &S) -> Result<String, ConfigError> {
    let value = to_value(source).map_err(|e| ConfigError::Marshal(e.to_string()))?;
    Ok(writer::compact(&value))
}

/// JSON text for `source`, indented by two spaces per level.
pub fn marshal_pretty<S: Serialize + ?Sized>(source: &S) -> Result<String, ConfigError> {
    let value = to_value(source).map_err(|e| ConfigError::Marshal(e.to_string()))?;
    Ok(writer::pretty(&value))
}

/// Parse `text` and bind it onto `T`. Use [`Value`] as `T` for the raw tree.
pub fn unmarshal<T: DeserializeOwned>(text: &str) -> Result<T, ConfigError> {
    mapper::bind(parse(text)?)
}

/// Parse a JSON array and bind every element onto `T`. A single object is
/// read as a one-element list.
pub fn unmarshal_list<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ConfigError> {
    let tree = match parse(text)? {
        Value::Null => Value::List(Vec::new()),
        list @ Value::List(_) => list,
        single => Value::List(vec![single]),
    };
    mapper::bind(tree)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::test::{Consumer, Level, SampleBean};
    use crate::temporal::{Date, DateTime, Time};

    const CONSUMERS: &str = "[{\"endpoint\":\"http://localhost:8080/api/v1/tc1/do\",\"channels\":[\"ch1\",\"ch2\"]},{\"endpoint\":\"http://localhost:8080/api/v1/tc2/do\",\"channels\":[\"ch2\"]},{\"endpoint\":\"LocalConsumer\",\"channels\":[\"ch3\"]}]";

    fn consumers() -> Vec<Consumer> {
        vec![
            Consumer::new("http://localhost:8080/api/v1/tc1/do", &["ch1", "ch2"]),
            Consumer::new("http://localhost:8080/api/v1/tc2/do", &["ch2"]),
            Consumer::new("LocalConsumer", &["ch3"]),
        ]
    }

    #[test]
    fn marshal_list_is_compact_and_ordered() {
        let json = marshal(&consumers()).unwrap();
        assert_eq!(json.len(), 195);
        assert_eq!(json, CONSUMERS);
    }

    #[test]
    fn unmarshal_list_round_trips() {
        let list: Vec<Consumer> = unmarshal_list(CONSUMERS).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].channels, vec!["ch1", "ch2"]);
        assert_eq!(list[2].endpoint, "LocalConsumer");
        assert_eq!(list[0].observer, None);
        let expected: Vec<_> = consumers()
            .into_iter()
            .map(|c| (c.endpoint, c.channels))
            .collect();
        let actual: Vec<_> = list.into_iter().map(|c| (c.endpoint, c.channels)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn unmarshal_into_generic_tree() {
        let tree: Value = unmarshal(CONSUMERS).unwrap();
        assert_eq!(tree.as_list().map(<[_]>::len), Some(3));
        let maps: Vec<HashMap<String, Value>> = unmarshal(CONSUMERS).unwrap();
        assert_eq!(maps[1]["endpoint"], Value::from("http://localhost:8080/api/v1/tc2/do"));
    }

    #[test]
    fn single_object_as_list() {
        let list: Vec<Consumer> =
            unmarshal_list(r#"{"endpoint": "solo", "channels": []}"#).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].channels.is_empty());
    }

    #[test]
    fn enums_and_temporals_marshal_as_text() {
        #[derive(serde::Serialize)]
        struct Record {
            level: Level,
            date: Date,
            time: Time,
            at: DateTime,
            note: Option<String>,
        }
        let record = Record {
            level: Level::Info,
            date: "2016/09/16".parse().unwrap(),
            time: "09:15".parse().unwrap(),
            at: "2016/09/16 09:15".parse().unwrap(),
            note: Some("line one\nline two\r".into()),
        };
        assert_eq!(
            marshal(&record).unwrap(),
            r#"{"level":"Info","date":"2016/09/16","time":"09:15:00","at":"2016/09/16 09:15:00","note":"line one\nline two\r"}"#
        );
    }

    #[test]
    fn pretty_marshal_reparses() {
        let bean = SampleBean {
            name: "child".into(),
            cost: 1080,
            threshold: 1.4,
            ..SampleBean::default()
        };
        let text = marshal_pretty(&bean).unwrap();
        assert!(text.starts_with("{\n  \"name\": \"child\",\n"));
        let back: SampleBean = unmarshal(&text).unwrap();
        assert_eq!(back, bean);
    }

    #[test]
    fn malformed_text_fails_before_binding() {
        let err = unmarshal::<Vec<Consumer>>("[{\"endpoint\": }]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }
}
