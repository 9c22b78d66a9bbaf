pub mod clock;
pub mod content_update;
pub mod job;
pub mod locator;
pub mod migration;
pub mod plan;
pub mod poller;
pub mod progress;

pub use clock::{Clock, ManualClock, TokioClock};
pub use content_update::{UpdateCategory, update, update_plan};
pub use job::{JobResult, JobSnapshot, JobState, JobStatus, Outcome, OutcomeResult};
pub use locator::{UNKNOWN_HOSTNAME, resolve_hostname};
pub use migration::{MigrationRequest, migrate, migration_plan};
pub use plan::{FailurePolicy, Operation, RunSummary, Sequencer, Step};
pub use poller::{JobPoller, PollOptions, cancellable};
pub use progress::{ConsoleProgress, MemoryProgress, ProgressEvent, ProgressSink};
