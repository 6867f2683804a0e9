use std::collections::BTreeMap;
use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-chosen identifier for a task, usually the entity ID behind the request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Wire shape accepted from API callers and task files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTaskSpec {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// One independent unit of remote retrieval. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTask {
    id: TaskId,
    endpoint: String,
    method: HttpMethod,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl FetchTask {
    pub fn get(id: impl Into<TaskId>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            method: HttpMethod::Get,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(id: impl Into<TaskId>, endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            method: HttpMethod::Post,
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Checks the fields a request cannot be issued without.
    pub(crate) fn validate(&self) -> Result<Url, String> {
        if self.id.0.trim().is_empty() {
            return Err(format!("task for '{}' has an empty id", self.endpoint));
        }

        let url = Url::parse(&self.endpoint)
            .map_err(|err| format!("task '{}' has an invalid endpoint: {err}", self.id))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(format!(
                "task '{}' uses unsupported scheme '{other}'",
                self.id
            )),
        }
    }
}

impl From<FetchTaskSpec> for FetchTask {
    fn from(spec: FetchTaskSpec) -> Self {
        Self {
            id: TaskId(spec.id),
            endpoint: spec.url,
            method: spec.method,
            query: spec.query.into_iter().collect(),
            body: spec.body,
        }
    }
}
