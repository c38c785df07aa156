use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::{ApiClient, ApiError, JobState, StatusResponse, SubmissionRequest};
use crate::model::{JobResult, UiEvent, build_job_result};

/// Delay between successful status polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Consecutive failed status requests tolerated before the job is
/// declared failed.
pub const MAX_POLL_FAILURES: u32 = 5;

/// Upper bound on the backoff delay after a failed status request.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Backoff before the next poll after `consecutive_failures` failed
/// requests in a row: 2 s doubling per failure, capped at 30 s.
pub fn retry_delay(consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(4);
    let delay = POLL_INTERVAL * 2u32.pow(exponent);
    delay.min(MAX_RETRY_DELAY)
}

/// How one polling lifecycle ended.
#[derive(Debug, PartialEq)]
pub enum PollEnd {
    /// The server reported "done"; carries the assembled results group
    Done(JobResult),
    /// The server reported "failed", or the retry budget ran out
    Failed(String),
}

/// Drive one job from submission to its terminal state.
///
/// Runs as a plain async task owning everything it needs: the request,
/// the indicator key, and an event sender. Independent jobs never share
/// state beyond the GUI's append-only sinks.
pub async fn run_job(
    api: Arc<ApiClient>,
    request: SubmissionRequest,
    key: String,
    tx: UnboundedSender<UiEvent>,
) {
    let filename = request.source_filename();
    match api.upload(&request).await {
        Ok(job_id) => {
            info!(job_id = %job_id, file = %filename, "job accepted");
            let _ = tx.send(UiEvent::JobAccepted {
                key: key.clone(),
                job_id: job_id.clone(),
                filename: filename.clone(),
            });
            watch_job(api, job_id, filename, key, tx).await;
        }
        Err(err) => {
            error!(file = %filename, error = %err, "upload failed");
            let message = match err {
                ApiError::Rejected => "Error: no job id received".to_string(),
                _ => "Upload failed.".to_string(),
            };
            let _ = tx.send(UiEvent::JobFailed {
                key,
                job_id: None,
                message,
            });
        }
    }
}

/// Poll an already-accepted job until it terminates, then report the
/// outcome. Also the entry point for jobs rehydrated from the store.
pub async fn watch_job(
    api: Arc<ApiClient>,
    job_id: String,
    filename: String,
    key: String,
    tx: UnboundedSender<UiEvent>,
) {
    let end = poll_until_terminal(&filename, || {
        let api = Arc::clone(&api);
        let job_id = job_id.clone();
        async move { api.status(&job_id).await }
    })
    .await;

    match end {
        PollEnd::Done(result) => {
            info!(job_id = %job_id, "job done");
            let _ = tx.send(UiEvent::JobDone { key, job_id, result });
        }
        PollEnd::Failed(message) => {
            warn!(job_id = %job_id, "job failed: {message}");
            let _ = tx.send(UiEvent::JobFailed {
                key,
                job_id: Some(job_id),
                message,
            });
        }
    }
}

/// The poll loop proper: fetch immediately, then every [`POLL_INTERVAL`]
/// while the status is non-terminal. A failed request retries with
/// [`retry_delay`] backoff; the [`MAX_POLL_FAILURES`]th consecutive
/// failure gives up. A successful fetch resets the failure counter.
pub async fn poll_until_terminal<F, Fut>(source_filename: &str, mut fetch: F) -> PollEnd
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusResponse, ApiError>>,
{
    let mut failures: u32 = 0;
    loop {
        match fetch().await {
            Ok(status) => match status.state() {
                JobState::Done => {
                    return PollEnd::Done(build_job_result(
                        source_filename,
                        status.outputs.as_ref(),
                        status.duration_seconds,
                    ));
                }
                JobState::Failed => return PollEnd::Failed("Processing failed.".to_string()),
                JobState::Pending => {
                    failures = 0;
                    sleep(POLL_INTERVAL).await;
                }
            },
            Err(err) => {
                failures += 1;
                warn!(failures, error = %err, "status check failed");
                if failures >= MAX_POLL_FAILURES {
                    return PollEnd::Failed(format!("Error checking status: {err}"));
                }
                sleep(retry_delay(failures)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use tokio::time::Instant;

    fn pending() -> Result<StatusResponse, ApiError> {
        Ok(StatusResponse {
            status: "pending".to_string(),
            outputs: None,
            duration_seconds: None,
        })
    }

    fn done() -> Result<StatusResponse, ApiError> {
        Ok(serde_json::from_str(
            r#"{
                "status": "done",
                "outputs": { "orig": "a_orig.mp4", "orig_srt": "a_orig.srt" },
                "duration_seconds": 12.5
            }"#,
        )
        .unwrap())
    }

    fn failed() -> Result<StatusResponse, ApiError> {
        Ok(StatusResponse {
            status: "failed".to_string(),
            outputs: None,
            duration_seconds: None,
        })
    }

    fn transport_error() -> Result<StatusResponse, ApiError> {
        Err(ApiError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }

    /// Run the loop against a scripted response sequence, counting fetches.
    async fn poll_scripted(responses: Vec<Result<StatusResponse, ApiError>>) -> (PollEnd, u32) {
        let script = RefCell::new(VecDeque::from(responses));
        let calls = Cell::new(0u32);
        let end = poll_until_terminal("a.mp4", || {
            calls.set(calls.get() + 1);
            let next = script
                .borrow_mut()
                .pop_front()
                .expect("poll loop outlived its script");
            async move { next }
        })
        .await;
        (end, calls.get())
    }

    /// [pending, pending, done] issues exactly three requests, 2 s apart,
    /// and ends Done with the assembled rows.
    #[tokio::test(start_paused = true)]
    async fn three_polls_to_done() {
        let started = Instant::now();
        let (end, calls) = poll_scripted(vec![pending(), pending(), done()]).await;

        assert_eq!(calls, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        match end {
            PollEnd::Done(result) => {
                assert_eq!(result.source_filename, "a.mp4");
                assert_eq!(result.duration_seconds, Some(12.5));
                assert_eq!(result.rows.len(), 2);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    /// A "failed" status terminates after a single request.
    #[tokio::test(start_paused = true)]
    async fn failed_status_stops_polling() {
        let (end, calls) = poll_scripted(vec![failed()]).await;
        assert_eq!(calls, 1);
        assert_eq!(end, PollEnd::Failed("Processing failed.".to_string()));
    }

    /// Five consecutive request failures exhaust the retry budget after
    /// the full 2+4+8+16 s backoff schedule.
    #[tokio::test(start_paused = true)]
    async fn retry_budget_exhausted() {
        let started = Instant::now();
        let (end, calls) = poll_scripted(vec![
            transport_error(),
            transport_error(),
            transport_error(),
            transport_error(),
            transport_error(),
        ])
        .await;

        assert_eq!(calls, 5);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert!(matches!(end, PollEnd::Failed(_)));
    }

    /// A successful poll resets the consecutive-failure counter.
    #[tokio::test(start_paused = true)]
    async fn transient_error_recovers() {
        let (end, calls) = poll_scripted(vec![
            transport_error(),
            pending(),
            transport_error(),
            done(),
        ])
        .await;

        assert_eq!(calls, 4);
        assert!(matches!(end, PollEnd::Done(_)));
    }

    /// Backoff doubles from the poll interval and caps at 30 s.
    #[test]
    fn retry_delay_schedule() {
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        assert_eq!(retry_delay(3), Duration::from_secs(8));
        assert_eq!(retry_delay(4), Duration::from_secs(16));
        assert_eq!(retry_delay(5), Duration::from_secs(30));
        assert_eq!(retry_delay(12), Duration::from_secs(30));
    }
}
