use std::{path::PathBuf, sync::Arc};

use log::{info, warn};
use tokio::sync::{mpsc, oneshot};

use super::CancelFlag;
use crate::ai::CompletionEndpoint;
use crate::jobs::{JobRequest, PipelineError};
use crate::progress::ProgressSink;

type JobReply = oneshot::Sender<Result<PathBuf, PipelineError>>;

#[derive(Debug)]
pub enum JobMsg {
    Start { request: JobRequest, reply: JobReply },
}

/// Dedicated worker that runs one invocation at a time, in submission order.
///
/// Cancellation goes through a shared flag rather than the channel, since the
/// worker does not read messages while a job is running. The flag is cleared
/// once a job has finished, so a request made before or while the job is
/// queued still stops it.
pub struct JobRunner {
    tx: mpsc::Sender<JobMsg>,
    cancel: CancelFlag,
}

impl JobRunner {
    /// Spawns the worker on the current tokio runtime.
    pub fn new(endpoint: Arc<dyn CompletionEndpoint>, sink: Arc<dyn ProgressSink>) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<JobMsg>(8);
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    JobMsg::Start { request, reply } => {
                        info!("starting job: {:?}", request.kind);

                        let result = request
                            .run(endpoint.as_ref(), sink.as_ref(), &worker_cancel)
                            .await;
                        worker_cancel.reset();
                        match &result {
                            Ok(path) => info!("job finished: {}", path.display()),
                            Err(err) => warn!("job failed: {err}"),
                        }

                        if reply.send(result).is_err() {
                            warn!("job result dropped; the caller stopped waiting");
                        }
                    }
                }
            }
        });

        Arc::new(Self { tx, cancel })
    }

    /// Queues `request` and waits for its outcome.
    pub async fn run(&self, request: JobRequest) -> Result<PathBuf, PipelineError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(JobMsg::Start { request, reply })
            .await
            .map_err(|_| PipelineError::WorkerUnavailable)?;
        outcome.await.map_err(|_| PipelineError::WorkerUnavailable)?
    }

    /// Asks the running job to stop before its next file or batch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }
}
