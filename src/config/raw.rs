use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawRequest {
    pub method: String,
    #[serde(default, alias = "testEndpoints")]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub serve_endpoint: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    pub code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// `Some(Value::Null)` when the file says `"body": null`; `None` when the key is absent.
    #[serde(default, deserialize_with = "present")]
    pub body: Option<Value>,
    #[serde(default, rename = "type")]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub serve_body: Option<Value>,
    #[serde(default)]
    pub serve_body_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawResource {
    pub name: String,
    #[serde(default)]
    pub serve_only: bool,
    pub request: RawRequest,
    pub response: RawResponse,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum RawResourceEntry {
    /// Resources defined in another file.
    Reference { fref: String },
    Inline(RawResource),
}

/// Content of a file referenced through `fref`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum RawReferencedResources {
    Many(Vec<RawResourceEntry>),
    One(RawResourceEntry),
}

impl RawReferencedResources {
    pub fn into_entries(self) -> Vec<RawResourceEntry> {
        match self {
            RawReferencedResources::Many(entries) => entries,
            RawReferencedResources::One(entry) => vec![entry],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub schemas: BTreeMap<String, Value>,
    #[serde(default)]
    pub schemas_dir: Option<String>,
    pub resources: Vec<RawResourceEntry>,
}
