use serde_yaml::{Mapping, Value};

use crate::error::ParseError;
use crate::workflow::locate::{LocatedUses, locate_uses};

/// A `uses` value and the 1-based line it sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesRef {
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub index: usize,
    pub uses: Option<UsesRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    /// Reusable workflow call.
    pub uses: Option<UsesRef>,
    pub steps: Vec<Step>,
}

/// Parsed workflow, line-annotated.
///
/// Only valid for the exact text it was parsed from; any edit to the text
/// invalidates every line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDocument {
    pub name: Option<String>,
    pub jobs: Vec<Job>,
}

/// One `uses` occurrence in document order.
#[derive(Debug, Clone, Copy)]
pub struct UsesSite<'a> {
    pub job_name: &'a str,
    pub step_index: Option<usize>,
    pub uses: &'a UsesRef,
}

impl WorkflowDocument {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let root: Value = serde_yaml::from_str(text).map_err(|e| ParseError::Yaml(e.to_string()))?;
        let root = root
            .as_mapping()
            .ok_or_else(|| ParseError::Structure("document root is not a mapping".into()))?;

        let name = root
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);

        let jobs_value = root
            .get("jobs")
            .ok_or_else(|| ParseError::Structure("missing `jobs`".into()))?;
        let empty = Mapping::new();
        let jobs_map = match jobs_value {
            Value::Mapping(m) => m,
            Value::Null => &empty,
            _ => return Err(ParseError::Structure("`jobs` is not a mapping".into())),
        };

        let located = locate_uses(text);
        let mut jobs = Vec::with_capacity(jobs_map.len());

        for (key, body) in jobs_map {
            let job_name = scalar_string(key)
                .ok_or_else(|| ParseError::Structure("job key is not a string".into()))?;
            jobs.push(parse_job(job_name, body, &located)?);
        }

        Ok(Self { name, jobs })
    }

    /// Workflow name for messages; falls back to an empty string like an
    /// unnamed workflow.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Every job-level and step-level `uses`, in document order.
    pub fn uses_sites(&self) -> Vec<UsesSite<'_>> {
        let mut out = Vec::new();
        for job in &self.jobs {
            if let Some(uses) = &job.uses {
                out.push(UsesSite {
                    job_name: &job.name,
                    step_index: None,
                    uses,
                });
            }
            for step in &job.steps {
                if let Some(uses) = &step.uses {
                    out.push(UsesSite {
                        job_name: &job.name,
                        step_index: Some(step.index),
                        uses,
                    });
                }
            }
        }
        out.sort_by_key(|s| s.uses.line);
        out
    }
}

fn parse_job(name: String, body: &Value, located: &[LocatedUses]) -> Result<Job, ParseError> {
    let Some(body) = body.as_mapping() else {
        return Err(ParseError::Structure(format!("job {name:?} is not a mapping")));
    };

    let uses = match uses_value(body, &name)? {
        Some(value) => Some(attach_line(&name, None, value, located)?),
        None => None,
    };

    let steps = match body.get("steps") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => {
            let mut steps = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let step_map = item.as_mapping().ok_or_else(|| {
                    ParseError::Structure(format!("job {name:?} step {index} is not a mapping"))
                })?;
                let uses = match uses_value(step_map, &name)? {
                    Some(value) => Some(attach_line(&name, Some(index), value, located)?),
                    None => None,
                };
                steps.push(Step { index, uses });
            }
            steps
        }
        Some(_) => {
            return Err(ParseError::Structure(format!(
                "job {name:?} `steps` is not a sequence"
            )));
        }
    };

    Ok(Job { name, uses, steps })
}

fn uses_value(map: &Mapping, job: &str) -> Result<Option<String>, ParseError> {
    match map.get("uses") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_string(v)
            .map(Some)
            .ok_or_else(|| ParseError::Structure(format!("job {job:?}: `uses` is not a scalar"))),
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Pair a structurally parsed `uses` with the line the locator found for it.
fn attach_line(
    job: &str,
    step_index: Option<usize>,
    value: String,
    located: &[LocatedUses],
) -> Result<UsesRef, ParseError> {
    located
        .iter()
        .find(|l| l.job == job && l.step_index == step_index && l.value == value)
        .map(|l| UsesRef {
            value: value.clone(),
            line: l.line,
        })
        .ok_or(ParseError::UsesMismatch {
            job: job.to_string(),
            value,
        })
}
