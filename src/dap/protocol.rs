use serde::{Deserialize, Serialize};
use serde_json::Value;

/// DAP request envelope.
#[derive(Debug, Serialize)]
pub struct DapRequest<'a> {
    pub seq: i64,
    #[serde(rename = "type")]
    pub r#type: &'static str,
    pub command: &'a str,
    pub arguments: Value,
}

/// Any message coming from the adapter. Only the fields needed for routing are typed.
#[derive(Debug, Deserialize)]
pub struct DapIncoming {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub request_seq: Option<i64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// DAP allows responses and events without body.
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments<'a> {
    pub expression: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    pub context: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateBody {
    pub result: String,
    #[serde(default)]
    pub memory_reference: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    pub variables_reference: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesBody {
    pub variables: Vec<DapVariable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DapVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub memory_reference: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMemoryArguments {
    pub memory_reference: String,
    pub offset: u64,
    pub count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMemoryBody {
    #[serde(default)]
    pub address: Option<String>,
    /// Absent when nothing could be read.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub unreadable_bytes: Option<u64>,
}
