#[cfg(test)]
pub mod test {
    use std::path::PathBuf;

    use serde::{Deserialize, Serialize};

    use crate::temporal::{Date, DateTime, Time};

    /// Directory holding the sample documents under `tests/resources`.
    pub fn resources() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources")
    }

    #[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
    #[serde(default)]
    pub struct SampleBean {
        pub name: String,
        pub cost: u32,
        pub threshold: f64,
        pub active: bool,
        pub langs: Vec<String>,
        pub nested: Option<NestedBean>,
    }

    #[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
    #[serde(default)]
    pub struct NestedBean {
        pub name: String,
        pub cost: u32,
    }

    /// A message consumer. `observer` is runtime state and never marshalled.
    #[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
    #[serde(default)]
    pub struct Consumer {
        pub endpoint: String,
        pub channels: Vec<String>,
        #[serde(skip)]
        pub observer: Option<String>,
    }

    impl Consumer {
        pub fn new(endpoint: &str, channels: &[&str]) -> Self {
            Self {
                endpoint: endpoint.into(),
                channels: channels.iter().map(|c| c.to_string()).collect(),
                observer: Some("runtime".into()),
            }
        }
    }

    #[derive(Deserialize, Debug, Default, PartialEq)]
    #[serde(default)]
    pub struct Endpoint {
        pub endpoint: String,
        pub channels: Vec<String>,
        pub retries: u32,
    }

    /// No defaults: every field must be present.
    #[derive(Deserialize, Debug)]
    #[allow(dead_code)]
    pub struct Strict {
        pub id: u32,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Level {
        Debug,
        Info,
        Warn,
    }

    /// Mirrors the `app.sample` block of the reference documents.
    #[derive(Deserialize, Debug, Default, PartialEq)]
    #[serde(default)]
    pub struct AppSample {
        pub local: String,
        pub url: String,
        pub cost: u32,
        pub date: Option<Date>,
        pub time: Option<Time>,
        pub datetime: Option<DateTime>,
        pub nested: Nested,
    }

    #[derive(Deserialize, Debug, Default, PartialEq)]
    #[serde(default)]
    pub struct Nested {
        pub name: String,
        pub threshold: f64,
    }

    #[test]
    fn resources_directory_exists() {
        assert!(resources().join("reference.conf").is_file());
    }
}
