//! Line locator for `uses` keys.
//!
//! Walks block-style workflow YAML by indentation and reports every job-level
//! and step-level `uses` together with its 1-based line number. Keys nested
//! deeper than a step's own keys (e.g. under `with:`) and block scalar
//! contents are ignored.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedUses {
    pub job: String,
    /// `None` for a job-level `uses` (reusable workflow call).
    pub step_index: Option<usize>,
    pub value: String,
    pub line: usize,
}

pub fn locate_uses(text: &str) -> Vec<LocatedUses> {
    let mut out = Vec::new();

    let mut in_jobs = false;
    let mut job_key_indent: Option<usize> = None;
    let mut job: Option<String> = None;
    let mut body_indent: Option<usize> = None;
    let mut steps: Option<StepsCursor> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim_start_matches(' ');
        let content = trimmed.trim_end();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let indent = raw.len() - trimmed.len();

        if indent == 0 {
            in_jobs = key_of(content) == Some("jobs");
            job_key_indent = None;
            job = None;
            body_indent = None;
            steps = None;
            continue;
        }
        if !in_jobs {
            continue;
        }

        let jki = *job_key_indent.get_or_insert(indent);
        if indent <= jki {
            job = key_of(content).map(str::to_string);
            body_indent = None;
            steps = None;
            continue;
        }

        let Some(job_name) = job.as_deref() else {
            continue;
        };
        let bi = *body_indent.get_or_insert(indent);

        if let Some(cursor) = steps.as_mut() {
            match cursor.feed(indent, content) {
                StepLine::Uses { step, value } => {
                    out.push(LocatedUses {
                        job: job_name.to_string(),
                        step_index: Some(step),
                        value,
                        line,
                    });
                    continue;
                }
                StepLine::Inside => continue,
                StepLine::Outside => steps = None,
            }
        }

        if indent == bi {
            match key_of(content) {
                Some("steps") => steps = Some(StepsCursor::new(indent)),
                Some("uses") => {
                    if let Some(value) = value_of(content) {
                        out.push(LocatedUses {
                            job: job_name.to_string(),
                            step_index: None,
                            value,
                            line,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    out
}

enum StepLine {
    Uses { step: usize, value: String },
    Inside,
    Outside,
}

/// Position inside a job's `steps:` sequence.
struct StepsCursor {
    key_indent: usize,
    item_indent: Option<usize>,
    step_key_indent: Option<usize>,
    index: Option<usize>,
}

impl StepsCursor {
    fn new(key_indent: usize) -> Self {
        Self {
            key_indent,
            item_indent: None,
            step_key_indent: None,
            index: None,
        }
    }

    fn feed(&mut self, indent: usize, content: &str) -> StepLine {
        let is_item = content == "-" || content.starts_with("- ");

        // Sequence items may sit at the same indent as `steps:` itself.
        let item_indent = match self.item_indent {
            Some(ii) => ii,
            None if is_item && indent >= self.key_indent => *self.item_indent.insert(indent),
            None if indent <= self.key_indent => return StepLine::Outside,
            None => return StepLine::Inside,
        };

        if is_item && indent == item_indent {
            let step = self.index.map_or(0, |i| i + 1);
            self.index = Some(step);

            let rest = content[1..].trim_start();
            if rest.is_empty() {
                self.step_key_indent = None;
                return StepLine::Inside;
            }
            self.step_key_indent = Some(indent + (content.len() - rest.len()));
            return match (key_of(rest), value_of(rest)) {
                (Some("uses"), Some(value)) => StepLine::Uses { step, value },
                _ => StepLine::Inside,
            };
        }

        if indent <= item_indent {
            return StepLine::Outside;
        }

        let Some(step) = self.index else {
            return StepLine::Inside;
        };
        let ski = *self.step_key_indent.get_or_insert(indent);
        if indent == ski {
            if let (Some("uses"), Some(value)) = (key_of(content), value_of(content)) {
                return StepLine::Uses { step, value };
            }
        }
        StepLine::Inside
    }
}

/// Mapping key of a `key: value` / `key:` line.
fn key_of(content: &str) -> Option<&str> {
    let pos = content
        .char_indices()
        .find(|&(i, c)| c == ':' && content[i + 1..].chars().next().is_none_or(|n| n == ' '))
        .map(|(i, _)| i)?;
    let key = content[..pos].trim();
    Some(unquote(key))
}

/// Scalar value of a `key: value` line with any trailing comment removed.
pub(crate) fn value_of(content: &str) -> Option<String> {
    let (_, rest) = content.split_once(": ")?;
    let rest = rest.trim();
    let value = match rest.chars().next() {
        // A quoted scalar ends at its closing quote; anything after it is a comment.
        Some(q @ ('"' | '\'')) => {
            let end = rest[1..].find(q)? + 1;
            &rest[1..end]
        }
        _ => match rest.find(" #") {
            Some(pos) => rest[..pos].trim_end(),
            None => rest,
        },
    };
    (!value.is_empty()).then(|| value.to_string())
}

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
