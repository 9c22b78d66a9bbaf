//! Operator-facing progress output.
//!
//! The sequencers never print directly; they describe what they are doing to
//! a [`ProgressSink`]. The console sink keeps an in-flight job on a single
//! self-overwriting line and terminates it with a newline once the job
//! finishes. Structured logs go through `tracing` separately.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use super::job::Outcome;

pub trait ProgressSink: Send + Sync {
    /// A step of a sequence is about to run.
    fn step(&self, message: &str);

    /// A polled job is not finished yet.
    fn job_progress(&self, job_id: &str, progress: Option<u8>);

    /// A polled job reached its terminal state. Called exactly once per job.
    fn job_complete(&self, outcome: &Outcome);

    /// Polling stopped before the job finished (deadline or cancellation).
    fn job_abandoned(&self, job_id: &str);
}

struct Console {
    out: Box<dyn Write + Send>,
    line_open: bool,
}

impl Console {
    fn close_line(&mut self) {
        if self.line_open {
            self.line_open = false;
            let _ = writeln!(self.out);
        }
    }
}

/// Writes progress to a terminal, stdout unless told otherwise.
pub struct ConsoleProgress {
    console: Mutex<Console>,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            console: Mutex::new(Console {
                out: Box::new(out),
                line_open: false,
            }),
        }
    }

    fn console(&self) -> MutexGuard<'_, Console> {
        self.console.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressSink for ConsoleProgress {
    fn step(&self, message: &str) {
        let mut console = self.console();
        console.close_line();
        let _ = writeln!(console.out, "{message}");
        let _ = console.out.flush();
    }

    fn job_progress(&self, job_id: &str, progress: Option<u8>) {
        let mut console = self.console();
        let _ = write!(
            console.out,
            "\rjob {} in progress [ {}% complete ]",
            job_id,
            progress.unwrap_or(0)
        );
        let _ = console.out.flush();
        console.line_open = true;
    }

    fn job_complete(&self, outcome: &Outcome) {
        let mut console = self.console();
        console.close_line();
        let _ = writeln!(
            console.out,
            "job {} is complete as {}",
            outcome.job_id, outcome.reported
        );
        if !outcome.is_success() && !outcome.details.is_empty() {
            let _ = writeln!(console.out, "{}", outcome.details);
        }
        let _ = console.out.flush();
    }

    fn job_abandoned(&self, _job_id: &str) {
        let mut console = self.console();
        console.close_line();
        let _ = console.out.flush();
    }
}

/// What a [`MemoryProgress`] sink recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Step(String),
    JobProgress { job_id: String, progress: Option<u8> },
    JobComplete(Outcome),
    JobAbandoned(String),
}

/// Thread-safe in-memory sink, shared by cloning.
#[derive(Clone, Default)]
pub struct MemoryProgress {
    inner: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.lock().clone()
    }

    pub fn steps(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Step(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<Outcome> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::JobComplete(o) => Some(o.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressEvent>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, event: ProgressEvent) {
        self.lock().push(event);
    }
}

impl ProgressSink for MemoryProgress {
    fn step(&self, message: &str) {
        self.push(ProgressEvent::Step(message.to_string()));
    }

    fn job_progress(&self, job_id: &str, progress: Option<u8>) {
        self.push(ProgressEvent::JobProgress {
            job_id: job_id.to_string(),
            progress,
        });
    }

    fn job_complete(&self, outcome: &Outcome) {
        self.push(ProgressEvent::JobComplete(outcome.clone()));
    }

    fn job_abandoned(&self, job_id: &str) {
        self.push(ProgressEvent::JobAbandoned(job_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::OutcomeResult;

    #[test]
    fn test_memory_progress_records_in_order() {
        let sink = MemoryProgress::new();
        let shared = sink.clone();

        shared.step("commit to panorama");
        shared.job_progress("12", Some(30));
        shared.job_complete(&Outcome {
            job_id: "12".to_string(),
            result: OutcomeResult::Success,
            reported: "OK".to_string(),
            details: String::new(),
        });

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ProgressEvent::Step("commit to panorama".to_string()));
        assert!(matches!(
            &events[1],
            ProgressEvent::JobProgress { job_id, progress: Some(30) } if job_id == "12"
        ));
        assert_eq!(sink.steps(), vec!["commit to panorama".to_string()]);
        assert_eq!(sink.completions().len(), 1);
    }

    /// Captures console output for inspection.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn failed_outcome(job_id: &str, details: &str) -> Outcome {
        Outcome {
            job_id: job_id.to_string(),
            result: OutcomeResult::Fail,
            reported: "FAIL".to_string(),
            details: details.to_string(),
        }
    }

    #[test]
    fn test_console_overwrites_progress_then_completes() {
        let captured = Captured::default();
        let console = ConsoleProgress::with_writer(captured.clone());

        console.step("commit to panorama");
        console.job_progress("7", Some(0));
        console.job_progress("7", Some(50));
        console.job_complete(&failed_outcome("7", "Validation Error:\naddress object missing"));

        assert_eq!(
            captured.text(),
            "commit to panorama\n\
             \rjob 7 in progress [ 0% complete ]\
             \rjob 7 in progress [ 50% complete ]\
             \njob 7 is complete as FAIL\n\
             Validation Error:\naddress object missing\n"
        );
    }

    #[test]
    fn test_console_finished_job_without_progress_line() {
        let captured = Captured::default();
        let console = ConsoleProgress::with_writer(captured.clone());

        console.job_complete(&Outcome {
            job_id: "5".to_string(),
            result: OutcomeResult::Success,
            reported: "OK".to_string(),
            details: String::new(),
        });

        assert_eq!(captured.text(), "job 5 is complete as OK\n");
    }

    #[test]
    fn test_console_abandoned_job_closes_line() {
        let captured = Captured::default();
        let console = ConsoleProgress::with_writer(captured.clone());

        console.job_progress("9", Some(12));
        console.job_abandoned("9");
        console.job_abandoned("9");
        console.step("next");

        assert_eq!(
            captured.text(),
            "\rjob 9 in progress [ 12% complete ]\nnext\n"
        );
    }
}
