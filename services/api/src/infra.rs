use conae_dashboard::error::AppError;
use conae_dashboard::fetch::{FetchPlan, FetchTask, FetchTaskSpec};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Accepted task file layouts: a bare list, a `{"tasks": [...]}` wrapper, or a template
/// expanded over entity IDs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TaskFile {
    List(Vec<FetchTaskSpec>),
    Wrapped {
        tasks: Vec<FetchTaskSpec>,
    },
    Template {
        template: String,
        ids: Vec<String>,
        #[serde(default)]
        query: BTreeMap<String, String>,
    },
}

impl TaskFile {
    pub(crate) fn into_tasks(self) -> Result<Vec<FetchTask>, AppError> {
        match self {
            TaskFile::List(specs) | TaskFile::Wrapped { tasks: specs } => {
                Ok(specs.into_iter().map(FetchTask::from).collect())
            }
            TaskFile::Template {
                template,
                ids,
                query,
            } => {
                let plan = query
                    .into_iter()
                    .fold(FetchPlan::from_template(template, ids)?, |plan, (key, value)| {
                        plan.with_query(key, value)
                    });
                Ok(plan.tasks())
            }
        }
    }
}

pub(crate) fn load_tasks(path: &Path) -> Result<Vec<FetchTask>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    parse_tasks(&raw)
}

pub(crate) fn parse_tasks(raw: &str) -> Result<Vec<FetchTask>, AppError> {
    let file: TaskFile = serde_json::from_str(raw)?;
    file.into_tasks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conae_dashboard::fetch::HttpMethod;

    #[test]
    fn parses_bare_task_lists() {
        let tasks = parse_tasks(
            r#"[
                {"id": "cba", "url": "https://api.example.test/stations/cba"},
                {"id": "q", "url": "https://api.example.test/query", "method": "post", "body": {"from": "2025-01-01"}}
            ]"#,
        )
        .expect("tasks parse");

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].method(), HttpMethod::Post);
        assert!(tasks[1].body().is_some());
    }

    #[test]
    fn parses_wrapped_task_lists() {
        let tasks = parse_tasks(
            r#"{"tasks": [{"id": "a", "url": "https://api.example.test/a", "query": {"page": "1"}}]}"#,
        )
        .expect("tasks parse");

        assert_eq!(tasks[0].query(), &[("page".to_string(), "1".to_string())]);
    }

    #[test]
    fn expands_template_files() {
        let tasks = parse_tasks(
            r#"{"template": "https://api.example.test/sites/{id}", "ids": ["1", "2", "3"], "query": {"window": "7d"}}"#,
        )
        .expect("tasks parse");

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[2].endpoint(), "https://api.example.test/sites/3");
        assert_eq!(tasks[0].query(), &[("window".to_string(), "7d".to_string())]);
    }

    #[test]
    fn template_without_placeholder_is_a_plan_error() {
        match parse_tasks(r#"{"template": "https://api.example.test/sites", "ids": ["1"]}"#) {
            Err(AppError::Plan(_)) => {}
            other => panic!("expected plan error, got {other:?}"),
        }
    }
}
