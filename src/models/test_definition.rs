//! Catalog entry model
//!
//! A [`TestDefinition`] is one named call against the upstream API. Its
//! identity is its position in the catalog; the name is descriptive only.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One request in the replay catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Relative to the client base address, may carry a query string
    pub path: String,
    #[serde(with = "method_serde", default = "default_method")]
    pub method: Method,
}

fn default_method() -> Method {
    Method::GET
}

impl TestDefinition {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
            path: path.into(),
            method,
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>, payload: Value) -> Self {
        Self::new(name, Method::POST, path).with_payload(payload)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Display for TestDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} {}]", self.name, self.method, self.path)
    }
}

pub(crate) mod method_serde {
    use reqwest::Method;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Method::from_bytes(raw.to_uppercase().as_bytes()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_builders() {
        let get = TestDefinition::get("Get Addon Info", "addon/310806");
        assert_eq!(get.method, Method::GET);
        assert!(!get.has_payload());

        let post = TestDefinition::post("Get Multiple Addons", "addon", json!([310806, 304026]));
        assert_eq!(post.method, Method::POST);
        assert_eq!(post.payload, Some(json!([310806, 304026])));
    }

    #[test]
    fn test_definition_display() {
        let def = TestDefinition::get("Get Games List", "game");
        assert_eq!(def.to_string(), "Get Games List [GET game]");
    }

    #[test]
    fn test_definition_from_yaml() {
        let yaml = r#"
- name: Get Addon by Fingerprint
  method: post
  path: fingerprint
  payload: [3028671922]
- name: Get Category List
  path: category
"#;
        let defs: Vec<TestDefinition> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].method, Method::POST);
        assert_eq!(defs[0].payload, Some(json!([3028671922u64])));
        assert_eq!(defs[1].method, Method::GET);
        assert!(defs[1].payload.is_none());
    }

    #[test]
    fn test_definition_json_shape() {
        let def = TestDefinition::get("Get Category Timestamp", "category/timestamp");
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(
            value,
            json!({"name": "Get Category Timestamp", "path": "category/timestamp", "method": "GET"})
        );
    }
}
