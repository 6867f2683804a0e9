use std::collections::HashSet;

use serde_json::Value;

use super::task::{FetchTask, HttpMethod};

const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("endpoint template '{0}' has no {{id}} placeholder")]
    MissingPlaceholder(String),
}

/// One request per entity against a shared endpoint template, e.g.
/// `https://api.example.test/stations/{id}/readings`.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    template: String,
    ids: Vec<String>,
    method: HttpMethod,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl FetchPlan {
    pub fn from_template<I, S>(template: impl Into<String>, ids: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let template = template.into();
        if !template.contains(ID_PLACEHOLDER) {
            return Err(PlanError::MissingPlaceholder(template));
        }

        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();

        Ok(Self {
            template,
            ids,
            method: HttpMethod::Get,
            query: Vec::new(),
            body: None,
        })
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Switches every task to a POST carrying the same JSON body.
    pub fn with_post_body(mut self, body: Value) -> Self {
        self.method = HttpMethod::Post;
        self.body = Some(body);
        self
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn tasks(&self) -> Vec<FetchTask> {
        self.ids
            .iter()
            .map(|id| {
                let endpoint = self
                    .template
                    .replace(ID_PLACEHOLDER, &urlencoding::encode(id));
                let task = match (&self.method, &self.body) {
                    (HttpMethod::Post, Some(body)) => {
                        FetchTask::post(id.as_str(), endpoint, body.clone())
                    }
                    _ => FetchTask::get(id.as_str(), endpoint),
                };
                self.query
                    .iter()
                    .fold(task, |task, (key, value)| task.with_query(key.clone(), value.clone()))
            })
            .collect()
    }
}
