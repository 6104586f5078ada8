use serde_json::Value;

/// Remote operation a [`JobHandle`] tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Parse,
    RandomForest,
    Glm,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Parse => "parse",
            JobKind::RandomForest => "rf",
            JobKind::Glm => "glm",
        }
    }
}

/// Caller-side view of a job.
///
/// `Pending -> Running -> {Succeeded, Failed, TimedOut}`. `Pending` may jump
/// straight to a terminal state when the job finishes between two polls.
/// Terminal states never change again; `TimedOut` only means the caller gave
/// up, the service may still be working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::TimedOut)
    }

    pub fn can_transition_to(
        &self,
        next: JobState,
    ) -> bool {
        match (self, next) {
            (JobState::Pending, JobState::Pending) => false,
            (JobState::Pending, _) => true,
            (JobState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

/// One observation of a remote job
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Running { progress: u64, total: u64 },
    Succeeded(JobResult),
    Failed(String),
}

/// Decoded JSON payload of a finished job
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    body: Value,
}

impl JobResult {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn json(&self) -> &Value {
        &self.body
    }

    pub fn into_json(self) -> Value {
        self.body
    }

    /// Looks up a dotted path such as `trainingSetValidation.trainingSetErrorRate`.
    /// Numeric segments index into arrays.
    pub fn get(
        &self,
        path: &str,
    ) -> Option<&Value> {
        path.split('.').try_fold(&self.body, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Numeric field, accepting numbers encoded as JSON strings
    pub fn get_f64(
        &self,
        path: &str,
    ) -> Option<f64> {
        match self.get(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_str(
        &self,
        path: &str,
    ) -> Option<&str> {
        self.get(path)?.as_str()
    }

    /// Every non-empty `error`/`errors`/`exception` field anywhere in the
    /// payload, as `path: message`
    pub fn errors(&self) -> Vec<String> {
        let mut found = Vec::new();
        collect_errors(&self.body, String::new(), &mut found);
        found
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }
}

fn collect_errors(
    value: &Value,
    path: String,
    found: &mut Vec<String>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                let lowered = key.to_ascii_lowercase();
                if matches!(lowered.as_str(), "error" | "errors" | "exception") && !is_empty(child) {
                    found.push(format!("{child_path}: {}", render(child)));
                } else {
                    collect_errors(child, child_path, found);
                }
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_errors(child, format!("{path}.{i}"), found);
            }
        }
        _ => {}
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(_) => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Opaque handle on a remote job, returned by the start call and used to poll
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    kind: JobKind,
    key: String,
    status_request: String,
    status_args: Vec<(String, String)>,
    state: JobState,
    result: Option<JobResult>,
}

impl JobHandle {
    /// Handle that will be polled through `status_request`
    pub fn new(
        kind: JobKind,
        key: impl Into<String>,
        status_request: impl Into<String>,
        status_args: Vec<(String, String)>,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            status_request: status_request.into(),
            status_args,
            state: JobState::Pending,
            result: None,
        }
    }

    /// Handle for a job the service finished inside the start call
    pub fn completed(
        kind: JobKind,
        key: impl Into<String>,
        result: JobResult,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            status_request: String::new(),
            status_args: vec![],
            state: JobState::Succeeded,
            result: Some(result),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Model key or destination data key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status_request(&self) -> &str {
        &self.status_request
    }

    pub fn status_args(&self) -> &[(String, String)] {
        &self.status_args
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    /// Moves to `next` if the state machine allows it; returns whether it did
    pub(crate) fn advance(
        &mut self,
        next: JobState,
    ) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}
