//! Job cancellation control

use super::MediaPipeline;
use crate::types::JobKind;

impl MediaPipeline {
    /// Cancel the active job of the given kind
    ///
    /// Cancellation is cooperative: the stage stops between queue items and
    /// between engine output lines, and the engine adapter kills its child
    /// process. Partial output files are left in place. The cancelled task
    /// emits [`crate::Event::Cancelled`] once it has wound down.
    ///
    /// Returns `true` when a job was signalled, `false` when the stage was
    /// idle.
    pub async fn cancel(&self, job: JobKind) -> bool {
        let active = self.active_jobs.lock().await;
        match active.get(&job) {
            Some(token) => {
                tracing::info!(job = %job, "cancelling active job");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every active job
    pub async fn cancel_all(&self) {
        let active = self.active_jobs.lock().await;
        for (job, token) in active.iter() {
            tracing::info!(job = %job, "cancelling active job");
            token.cancel();
        }
    }
}
