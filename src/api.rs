use std::path::{Path, PathBuf};

use reqwest::multipart;
use serde::{Deserialize, Deserializer};

use crate::options::ModelBackend;
use crate::tracks::{AnalyzeResponse, TrackDescriptor};

/// Default server address when `SUBTITLE_API_URL` is unset.
const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Everything the form contributes to one `/upload` call.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    /// Local path of the media file to upload
    pub file_path: PathBuf,
    /// Whitespace-separated target language codes; empty for none
    pub langs: String,
    /// Source language code; empty lets the server auto-detect
    pub original_lang: String,
    /// Model name; must come from the selected backend's option list
    pub model: String,
    /// Which transcription engine runs the job
    pub model_type: ModelBackend,
    /// Align subtitle timings after transcription
    pub align: bool,
    /// Processing device ("auto", "cpu", "cuda", "videotoolbox")
    pub processor: String,
    /// How subtitles are attached to the output ("hard", "soft", "none")
    pub subtitle_burn_type: String,
    /// Container audio stream to transcribe; None lets the server pick
    pub audio_track: Option<u32>,
    /// Container subtitle stream to reuse; None lets the server pick
    pub subtitle_track: Option<u32>,
    /// Skip transcription and work from the selected subtitle track only
    pub use_subtitles_only: Option<bool>,
}

impl SubmissionRequest {
    /// Filename component of the uploaded file, for indicators and results.
    pub fn source_filename(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }
}

/// Response returned by `/upload`. A body without `job_id` means the
/// server rejected the submission.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Response returned by `/status/{job_id}`.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    /// Raw status string; anything other than "done"/"failed" counts as pending
    pub status: String,
    /// Output label → filename map, present once the job is done
    #[serde(default)]
    pub outputs: Option<serde_json::Map<String, serde_json::Value>>,
    /// Wall-clock processing time. The server sometimes encodes this as a
    /// numeric string, so both forms are accepted.
    #[serde(default, deserialize_with = "duration_number_or_string")]
    pub duration_seconds: Option<f64>,
}

/// Job lifecycle as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Done,
    Failed,
}

impl JobState {
    /// Check if this is a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl StatusResponse {
    /// Classify the raw status string. Unknown strings stay non-terminal
    /// so the poll loop keeps waiting.
    pub fn state(&self) -> JobState {
        match self.status.as_str() {
            "done" => JobState::Done,
            "failed" => JobState::Failed,
            _ => JobState::Pending,
        }
    }
}

fn duration_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Errors from the transcription service API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The upload response carried no job identifier.
    #[error("upload rejected: no job id in response")]
    Rejected,

    /// The local media file could not be read.
    #[error("could not read media file: {0}")]
    File(#[from] std::io::Error),
}

/// HTTP client for the transcription service.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the service at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client from the `SUBTITLE_API_URL` environment variable,
    /// falling back to the local default.
    pub fn from_env() -> Self {
        let url = std::env::var("SUBTITLE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(url)
    }

    /// Submit one media file for transcription.
    ///
    /// Sends a `POST /upload` multipart request with the file plus all form
    /// options. Returns the server-assigned job identifier.
    pub async fn upload(&self, request: &SubmissionRequest) -> Result<String, ApiError> {
        let mut form = multipart::Form::new()
            .part("file", file_part(&request.file_path).await?)
            .text("langs", request.langs.clone())
            .text("original_lang", request.original_lang.clone())
            .text("model", request.model.clone())
            .text("model_type", request.model_type.wire_name())
            .text("align", request.align.to_string())
            .text("processor", request.processor.clone())
            .text("subtitle_burn_type", request.subtitle_burn_type.clone());
        if let Some(track) = request.audio_track {
            form = form.text("audio_track", track.to_string());
        }
        if let Some(track) = request.subtitle_track {
            form = form.text("subtitle_track", track.to_string());
        }
        if let Some(subs_only) = request.use_subtitles_only {
            form = form.text("use_subtitles_only", subs_only.to_string());
        }

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let parsed: UploadResponse = Self::parse_response(response).await?;
        parsed.job_id.ok_or(ApiError::Rejected)
    }

    /// Fetch the current status of a submitted job.
    pub async fn status(&self, job_id: &str) -> Result<StatusResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/status/{}", self.base_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Probe a media file for its audio and subtitle tracks.
    ///
    /// Sends a `POST /analyze` multipart request with only the file.
    pub async fn analyze(&self, path: &Path) -> Result<Vec<TrackDescriptor>, ApiError> {
        let form = multipart::Form::new().part("file", file_part(path).await?);

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let parsed: AnalyzeResponse = Self::parse_response(response).await?;
        Ok(parsed.tracks)
    }

    /// Hyperlink target for a finished output file. Never fetched by the
    /// client itself.
    pub fn download_url(&self, filename: &str) -> String {
        format!("{}/download/{}", self.base_url, filename)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or an [`ApiError::Status`] containing the
    /// status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Read a local file into a multipart part carrying its filename.
async fn file_part(path: &Path) -> Result<multipart::Part, ApiError> {
    let data = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());
    Ok(multipart::Part::bytes(data).file_name(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A bare `{"status": "processing"}` body parses as pending with no
    /// outputs or duration.
    #[test]
    fn status_pending_minimal() {
        let parsed: StatusResponse = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(parsed.state(), JobState::Pending);
        assert!(parsed.outputs.is_none());
        assert!(parsed.duration_seconds.is_none());
    }

    /// A done body carries outputs and a numeric duration.
    #[test]
    fn status_done_with_outputs() {
        let body = r#"{
            "status": "done",
            "outputs": { "orig": "a_orig.mp4", "orig_srt": "a_orig.srt" },
            "duration_seconds": 12.5
        }"#;
        let parsed: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.state(), JobState::Done);
        assert_eq!(parsed.outputs.as_ref().unwrap().len(), 2);
        assert_eq!(parsed.duration_seconds, Some(12.5));
    }

    /// The server sometimes stringifies the duration; both forms decode.
    #[test]
    fn status_duration_as_string() {
        let parsed: StatusResponse =
            serde_json::from_str(r#"{"status":"done","duration_seconds":"12.5"}"#).unwrap();
        assert_eq!(parsed.duration_seconds, Some(12.5));

        let parsed: StatusResponse =
            serde_json::from_str(r#"{"status":"done","duration_seconds":"soon"}"#).unwrap();
        assert_eq!(parsed.duration_seconds, None);
    }

    /// Unknown status strings stay non-terminal; "failed" is terminal.
    #[test]
    fn state_classification() {
        let status = |s: &str| StatusResponse {
            status: s.to_string(),
            outputs: None,
            duration_seconds: None,
        };
        assert_eq!(status("pending").state(), JobState::Pending);
        assert_eq!(status("queued").state(), JobState::Pending);
        assert_eq!(status("done").state(), JobState::Done);
        assert_eq!(status("failed").state(), JobState::Failed);
        assert!(!status("queued").state().is_terminal());
        assert!(status("done").state().is_terminal());
        assert!(status("failed").state().is_terminal());
    }

    /// An upload body without `job_id` signals rejection.
    #[test]
    fn upload_response_missing_job_id() {
        let parsed: UploadResponse = serde_json::from_str(r#"{"error":"bad file"}"#).unwrap();
        assert!(parsed.job_id.is_none());

        let parsed: UploadResponse = serde_json::from_str(r#"{"job_id":"movie_ab12"}"#).unwrap();
        assert_eq!(parsed.job_id.as_deref(), Some("movie_ab12"));
    }

    /// Download links point at `/download/<filename>` under the base URL,
    /// regardless of trailing slashes in configuration.
    #[test]
    fn download_url_format() {
        let api = ApiClient::new("http://localhost:8080/");
        assert_eq!(
            api.download_url("a_orig.mp4"),
            "http://localhost:8080/download/a_orig.mp4"
        );
    }
}
