use crate::{
    cache::ExpiringMap,
    http::secs_from_env,
    models::{ApiError, RunRequest},
    pipeline::{Pipeline, PipelineError, RunSummary},
    security::AuthContext,
};
use async_trait::async_trait;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Runs are executed one at a time: there is a single browser profile and
/// each marketplace session can only drive one form.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    statuses: Arc<Mutex<StatusBook>>,
}

/// Queued and running jobs are kept until they finish; finished ones stay
/// readable for the retention window.
struct StatusBook {
    active: HashMap<Uuid, JobState>,
    finished: ExpiringMap<Uuid, JobState>,
}

impl StatusBook {
    fn new(retention: Duration) -> Self {
        Self {
            active: HashMap::new(),
            finished: ExpiringMap::new(retention),
        }
    }

    fn set(&mut self, id: Uuid, state: JobState) {
        match state {
            JobState::Queued | JobState::Running => {
                self.active.insert(id, state);
            }
            JobState::Completed { .. } | JobState::Failed { .. } => {
                self.active.remove(&id);
                self.finished.insert(id, state);
            }
        }
    }

    fn get(&self, id: &Uuid) -> Option<&JobState> {
        self.active.get(id).or_else(|| self.finished.get(id))
    }
}

#[derive(Clone)]
struct Job {
    id: Uuid,
    request: RunRequest,
    operator: String,
}

#[derive(Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed {
        summary: RunSummary,
    },
    Failed {
        error: String,
        stage: Option<String>,
    },
}

#[derive(Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    #[serde(flatten)]
    pub state: JobState,
}

/// Anything the worker can hand a run to.
#[async_trait]
pub trait RunExecutor: Send + Sync + 'static {
    async fn execute(&self, request: RunRequest) -> Result<RunSummary, PipelineError>;
}

#[async_trait]
impl RunExecutor for Pipeline {
    async fn execute(&self, request: RunRequest) -> Result<RunSummary, PipelineError> {
        self.run(request).await
    }
}

impl JobQueue {
    pub fn spawn(runner: impl RunExecutor) -> (Self, JoinHandle<()>) {
        Self::spawn_with_retention(runner, secs_from_env("JOB_RETENTION_SECS", 86_400))
    }

    pub fn spawn_with_retention(
        runner: impl RunExecutor,
        retention: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(queue_capacity_from_env());
        let statuses = Arc::new(Mutex::new(StatusBook::new(retention)));
        let statuses_bg = statuses.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                {
                    let mut guard = statuses_bg.lock().await;
                    guard.set(job.id, JobState::Running);
                }
                info!(
                    target = "hermes.jobs",
                    job_id = %job.id,
                    operator = %job.operator,
                    marketplace = %job.request.marketplace,
                    "run_started"
                );

                let result = runner.execute(job.request).await;
                let mut guard = statuses_bg.lock().await;
                match result {
                    Ok(summary) => {
                        guard.set(job.id, JobState::Completed { summary });
                    }
                    Err(err) => {
                        warn!(target = "hermes.jobs", job_id = %job.id, error = %err, "run_failed");
                        guard.set(
                            job.id,
                            JobState::Failed {
                                error: err.detail().to_string(),
                                stage: Some(err.stage().to_string()),
                            },
                        );
                    }
                }
            }
        });

        (Self { tx, statuses }, handle)
    }

    /// The caller picks the id so it can be bound to an idempotency key
    /// before the job exists.
    pub async fn enqueue_run(
        &self,
        id: Uuid,
        request: RunRequest,
        context: AuthContext,
    ) -> Result<Uuid, ApiError> {
        {
            let mut guard = self.statuses.lock().await;
            guard.set(id, JobState::Queued);
        }
        let job = Job {
            id,
            request,
            operator: context.operator,
        };
        self.tx.send(job).await.map_err(|_| ApiError {
            error: "queue_send_failed".into(),
            detail: Some("worker not available".into()),
        })?;
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        let guard = self.statuses.lock().await;
        guard.get(&id).cloned().map(|state| JobInfo {
            id: id.to_string(),
            state,
        })
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Marketplace;

    struct InstantRunner;

    #[async_trait]
    impl RunExecutor for InstantRunner {
        async fn execute(&self, request: RunRequest) -> Result<RunSummary, PipelineError> {
            Ok(RunSummary {
                run_id: Uuid::new_v4(),
                marketplace: request.marketplace,
                attempted: 0,
                published: 0,
                failed: 0,
                rejected: 0,
                warnings: 0,
                advertisements: Vec::new(),
            })
        }
    }

    fn operator() -> AuthContext {
        AuthContext {
            operator: "ania".into(),
            api_key_id: "key-01".into(),
        }
    }

    async fn wait_until_finished(queue: &JobQueue, id: Uuid) {
        for _ in 0..50 {
            if let Some(info) = queue.get(id).await
                && matches!(info.state, JobState::Completed { .. })
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never finished");
    }

    #[tokio::test]
    async fn finished_jobs_are_forgotten_after_retention() {
        let (queue, _worker) =
            JobQueue::spawn_with_retention(InstantRunner, Duration::from_millis(150));
        let first = Uuid::new_v4();
        queue
            .enqueue_run(first, RunRequest::default(), operator())
            .await
            .expect("enqueued");
        wait_until_finished(&queue, first).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(queue.get(first).await.is_none());

        let second = Uuid::new_v4();
        queue
            .enqueue_run(
                second,
                RunRequest {
                    marketplace: Marketplace::Grailed,
                    user_id: None,
                },
                operator(),
            )
            .await
            .expect("enqueued");
        wait_until_finished(&queue, second).await;
        let guard = queue.statuses.lock().await;
        assert!(guard.active.is_empty());
        assert!(guard.get(&second).is_some());
    }

    #[test]
    fn active_jobs_never_lapse() {
        let mut book = StatusBook::new(Duration::ZERO);
        let id = Uuid::new_v4();
        book.set(id, JobState::Running);
        assert!(matches!(book.get(&id), Some(JobState::Running)));
        book.set(
            id,
            JobState::Failed {
                error: "gone".into(),
                stage: None,
            },
        );
        assert!(book.get(&id).is_none());
    }
}
