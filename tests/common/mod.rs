#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use panops::core::{JobPoller, ManualClock, MemoryProgress, PollOptions};
use panops::xapi::{ApiResponse, CommitScope, XapiSession};
use panops::{PanError, Result};
use tokio_util::sync::CancellationToken;

/// A call recorded by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Op { cmd: String, target: Option<String> },
    Set { xpath: String, element: String },
    Delete { xpath: String },
    Commit { cmd: String, scope: CommitScope },
}

impl Call {
    pub fn is_status_query(&self) -> bool {
        matches!(self, Call::Op { cmd, .. } if cmd.starts_with("<show><jobs>"))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Call::Op { .. } if self.is_status_query() => "status",
            Call::Op { .. } => "op",
            Call::Set { .. } => "set",
            Call::Delete { .. } => "delete",
            Call::Commit {
                scope: CommitScope::Local,
                ..
            } => "commit",
            Call::Commit {
                scope: CommitScope::All,
                ..
            } => "commit-all",
        }
    }
}

/// Session that records every call.
///
/// Non-status calls are answered from `replies` in order (a plain success
/// once the queue is empty). Status queries are answered from the per-job
/// script; the last scripted status repeats forever.
#[derive(Default)]
pub struct MockSession {
    calls: Mutex<Vec<Call>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    replies: Mutex<VecDeque<Result<ApiResponse>>>,
    statuses: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Result<ApiResponse>) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn script_job(&self, job_id: &str, statuses: Vec<ApiResponse>) -> &Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), statuses.into());
        self
    }

    /// Trip `cancel` while the `count`-th call is in flight; that call
    /// still completes.
    pub fn cancel_after(&self, count: usize, cancel: CancellationToken) -> &Self {
        *self.cancel_after.lock().unwrap() = Some((count, cancel));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::label).collect()
    }

    fn record(&self, call: Call) {
        let made = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };
        if let Some((count, cancel)) = self.cancel_after.lock().unwrap().as_ref() {
            if made == *count {
                cancel.cancel();
            }
        }
    }

    fn next_reply(&self) -> Result<ApiResponse> {
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok(ok()))
    }

    fn status_for(&self, cmd: &str) -> Result<ApiResponse> {
        let job_id = cmd
            .trim_start_matches("<show><jobs><id>")
            .trim_end_matches("</id></jobs></show>")
            .to_string();
        let mut statuses = self.statuses.lock().unwrap();
        let script = statuses
            .get_mut(&job_id)
            .unwrap_or_else(|| panic!("no status script for job {job_id}"));
        if script.len() > 1 {
            Ok(script.pop_front().unwrap())
        } else {
            Ok(script.front().cloned().unwrap())
        }
    }
}

#[async_trait]
impl XapiSession for MockSession {
    async fn op(&self, cmd: &str, target: Option<&str>) -> Result<ApiResponse> {
        let call = Call::Op {
            cmd: cmd.to_string(),
            target: target.map(str::to_string),
        };
        let is_status = call.is_status_query();
        self.record(call);
        if is_status {
            self.status_for(cmd)
        } else {
            self.next_reply()
        }
    }

    async fn set(&self, xpath: &str, element: &str) -> Result<ApiResponse> {
        self.record(Call::Set {
            xpath: xpath.to_string(),
            element: element.to_string(),
        });
        self.next_reply()
    }

    async fn delete(&self, xpath: &str) -> Result<ApiResponse> {
        self.record(Call::Delete {
            xpath: xpath.to_string(),
        });
        self.next_reply()
    }

    async fn commit(&self, cmd: &str, scope: CommitScope) -> Result<ApiResponse> {
        self.record(Call::Commit {
            cmd: cmd.to_string(),
            scope,
        });
        self.next_reply()
    }
}

pub fn ok() -> ApiResponse {
    ApiResponse::new(r#"<response status="success" code="20"><msg>command succeeded</msg></response>"#)
}

pub fn submitted(job_id: &str) -> ApiResponse {
    ApiResponse::new(format!(
        r#"<response status="success" code="19"><result><msg><line>Job enqueued with jobid {job_id}</line></msg><job>{job_id}</job></result></response>"#
    ))
}

pub fn status(job_id: &str, status: &str, progress: &str, result: &str) -> ApiResponse {
    ApiResponse::new(format!(
        r#"<response status="success"><result><job><tenq>2024/05/01 10:00:00</tenq><id>{job_id}</id><type>Commit</type><status>{status}</status><progress>{progress}</progress><result>{result}</result></job></result></response>"#
    ))
}

pub fn failed(job_id: &str, details: &[&str]) -> ApiResponse {
    let lines: String = details
        .iter()
        .map(|l| format!("<line>{l}</line>"))
        .collect();
    ApiResponse::new(format!(
        r#"<response status="success"><result><job><id>{job_id}</id><status>FIN</status><progress>100</progress><result>FAIL</result><details>{lines}</details></job></result></response>"#
    ))
}

pub fn api_error(code: u32, message: &str) -> PanError {
    PanError::Api {
        code: Some(code),
        message: message.to_string(),
    }
}

pub fn device_group(name: &str, members: &[(&str, &str)]) -> ApiResponse {
    let entries: String = members
        .iter()
        .map(|(sn, host)| {
            format!(
                r#"<entry name="{sn}"><serial>{sn}</serial><connected>yes</connected><hostname>{host}</hostname></entry>"#
            )
        })
        .collect();
    ApiResponse::new(format!(
        r#"<response status="success"><result><devicegroups><entry name="{name}"><shared-policy-md5sum>0</shared-policy-md5sum><devices>{entries}</devices></entry></devicegroups></result></response>"#
    ))
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub progress: MemoryProgress,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new()),
            progress: MemoryProgress::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn poller(&self, options: PollOptions) -> JobPoller {
        JobPoller::new(options, Arc::new(self.progress.clone()))
            .with_clock(self.clock.clone())
            .with_cancellation(self.cancel.clone())
    }
}
