//! Background analysis runs: the per-song orchestration and the worker pool
//! that schedules it.

mod dispatcher;
mod orchestrator;

pub use dispatcher::{Dispatcher, RunHandle, SongLocks, WorkerPoolDispatcher};
pub use orchestrator::{AnalysisOrchestrator, RunOutcome};
