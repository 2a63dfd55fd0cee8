use super::orchestrator::{AnalysisOrchestrator, RunOutcome};
use crate::song::SongStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A background analysis run that was handed to a [`Dispatcher`].
pub struct RunHandle {
    task_id: String,
    handle: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Waits for the run to finish. Returns None if the task panicked or
    /// was dropped with the runtime.
    pub async fn wait(self) -> Option<RunOutcome> {
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Analysis task {} did not finish: {}", self.task_id, e);
                None
            }
        }
    }
}

pub trait Dispatcher: Send + Sync {
    /// Schedules an analysis run for the song and returns immediately.
    fn enqueue(&self, song_id: &str) -> RunHandle;

    /// Like [`Dispatcher::enqueue`], but the run first drops the song's
    /// cached lyrics and analysis. The caches are cleared only once any
    /// earlier run of the same song has finished.
    fn enqueue_reanalysis(&self, song_id: &str) -> RunHandle;
}

/// One async lock per song, so runs for the same song never overlap.
#[derive(Default)]
pub struct SongLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SongLocks {
    pub async fn acquire(&self, song_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .unwrap()
            .entry(song_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Forgets the song's lock once nobody holds or waits on it.
    pub fn release(&self, song_id: &str, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut locks = self.locks.lock().unwrap();
        if locks
            .get(song_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(song_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs each analysis on its own tokio task, at most `max_concurrent_runs`
/// at a time.
pub struct WorkerPoolDispatcher {
    orchestrator: Arc<AnalysisOrchestrator>,
    song_store: Arc<dyn SongStore>,
    permits: Arc<Semaphore>,
    song_locks: Arc<SongLocks>,
}

impl WorkerPoolDispatcher {
    pub fn new(
        orchestrator: Arc<AnalysisOrchestrator>,
        song_store: Arc<dyn SongStore>,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            orchestrator,
            song_store,
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            song_locks: Arc::new(SongLocks::default()),
        }
    }
}

impl WorkerPoolDispatcher {
    fn spawn_run(&self, song_id: &str, fresh: bool) -> RunHandle {
        let task_id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = self.song_store.set_task_id(song_id, &task_id) {
            warn!("Failed to record task {} on song {}: {}", task_id, song_id, e);
        }

        let orchestrator = self.orchestrator.clone();
        let permits = self.permits.clone();
        let song_locks = self.song_locks.clone();
        let song_id = song_id.to_string();
        let run_task_id = task_id.clone();
        let handle = tokio::spawn(async move {
            let guard = song_locks.acquire(&song_id).await;
            if fresh {
                match orchestrator.forget_cached(&song_id) {
                    Ok(true) => debug!("Task {} cleared caches of song {}", run_task_id, song_id),
                    Ok(false) => {}
                    Err(e) => warn!(
                        "Failed to reset song {} for task {}: {}",
                        song_id, run_task_id, e
                    ),
                }
            }
            let outcome = match permits.acquire().await {
                Ok(_permit) => {
                    debug!("Task {} starting analysis of song {}", run_task_id, song_id);
                    orchestrator.run(&song_id).await
                }
                Err(e) => {
                    error!("Worker pool closed, dropping task {}: {}", run_task_id, e);
                    RunOutcome::Failed(e.to_string())
                }
            };
            song_locks.release(&song_id, guard);
            outcome
        });

        RunHandle { task_id, handle }
    }
}

impl Dispatcher for WorkerPoolDispatcher {
    fn enqueue(&self, song_id: &str) -> RunHandle {
        self.spawn_run(song_id, false)
    }

    fn enqueue_reanalysis(&self, song_id: &str) -> RunHandle {
        self.spawn_run(song_id, true)
    }
}
