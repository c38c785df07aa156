use serde_json::{Map, Value};

use crate::tracks::TrackDescriptor;

/// Represents the current state of a submitted job
#[derive(Clone, Debug, PartialEq)]
pub enum JobPhase {
    /// The file is being sent to the server
    Uploading,
    /// The server accepted the job and is transcribing
    Processing,
    /// Transcription finished; outputs are in the results table
    Done,
    /// The job failed; carries a short human-readable reason
    Failed(String),
}

impl JobPhase {
    /// Terminal phases end the polling lifecycle for their job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Done | JobPhase::Failed(_))
    }
}

/// Data structure for tracking one submitted file in the UI
#[derive(Clone, Debug)]
pub struct JobTask {
    /// Indicator key derived from the filename (stable across re-submission)
    pub key: String,
    /// Original filename as picked by the user
    pub filename: String,
    /// Current phase of the job
    pub phase: JobPhase,
}

/// One download link in the results table
#[derive(Clone, Debug, PartialEq)]
pub struct OutputRow {
    /// Output label as reported by the server (e.g. "orig", "de_srt")
    pub label: String,
    /// Server-side filename, used to build the download link
    pub filename: String,
}

/// One completed job's group of rows in the results table
#[derive(Clone, Debug, PartialEq)]
pub struct JobResult {
    /// Source filename, shown on the group's first row
    pub source_filename: String,
    /// Processing time in seconds, shown next to the filename if reported
    pub duration_seconds: Option<f64>,
    /// Download rows, one per usable output entry
    pub rows: Vec<OutputRow>,
}

/// Messages sent from spawned tasks back to the GUI thread.
#[derive(Debug)]
pub enum UiEvent {
    /// The server assigned a job id; the indicator moves to Processing
    JobAccepted {
        key: String,
        job_id: String,
        filename: String,
    },
    /// The job reached Done; append its rows to the results table
    JobDone {
        key: String,
        job_id: String,
        result: JobResult,
    },
    /// The job reached Failed (rejection, transport failure, or server
    /// "failed" status); `job_id` is None when polling never started
    JobFailed {
        key: String,
        job_id: Option<String>,
        message: String,
    },
    /// Track analysis finished for the currently selected file
    TracksAnalyzed { tracks: Vec<TrackDescriptor> },
    /// Track analysis failed; hide the track selectors
    AnalyzeFailed,
}

/// Derive the progress-indicator key for a filename: every
/// non-alphanumeric character becomes `_`, so re-submitting a file with
/// the same name reuses its indicator.
pub fn indicator_key(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Build the results-table group for a completed job.
///
/// One row per `outputs` entry whose value is a plain string; the
/// bookkeeping labels the server mixes into the map ("status",
/// "duration_seconds") are skipped. Entry order is preserved.
pub fn build_job_result(
    source_filename: &str,
    outputs: Option<&Map<String, Value>>,
    duration_seconds: Option<f64>,
) -> JobResult {
    let rows = outputs
        .map(|map| {
            map.iter()
                .filter(|(label, _)| label.as_str() != "status" && label.as_str() != "duration_seconds")
                .filter_map(|(label, value)| {
                    value.as_str().map(|filename| OutputRow {
                        label: label.clone(),
                        filename: filename.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    JobResult {
        source_filename: source_filename.to_string(),
        duration_seconds,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Non-alphanumeric characters map to underscores; same-named files get
    /// the same key.
    #[test]
    fn indicator_key_sanitizes() {
        assert_eq!(indicator_key("My Movie (2019).mkv"), "My_Movie__2019__mkv");
        assert_eq!(indicator_key("clip.mp4"), indicator_key("clip.mp4"));
        assert_eq!(indicator_key("über.mp4"), "_ber_mp4");
    }

    /// Two outputs and a duration produce two rows under one group carrying
    /// the source filename and 12.5.
    #[test]
    fn build_result_two_outputs() {
        let outputs: Map<String, Value> = serde_json::from_str(
            r#"{ "orig": "a_orig.mp4", "orig_srt": "a_orig.srt" }"#,
        )
        .unwrap();
        let result = build_job_result("a.mp4", Some(&outputs), Some(12.5));

        assert_eq!(result.source_filename, "a.mp4");
        assert_eq!(result.duration_seconds, Some(12.5));
        assert_eq!(
            result.rows,
            vec![
                OutputRow { label: "orig".into(), filename: "a_orig.mp4".into() },
                OutputRow { label: "orig_srt".into(), filename: "a_orig.srt".into() },
            ]
        );
    }

    /// Non-string values and bookkeeping labels never become rows.
    #[test]
    fn build_result_skips_non_files() {
        let outputs: Map<String, Value> = serde_json::from_str(
            r#"{
                "status": "done",
                "orig": "b_orig.mp4",
                "duration_seconds": "3.1",
                "frames": 1200,
                "missing": null
            }"#,
        )
        .unwrap();
        let result = build_job_result("b.mp4", Some(&outputs), None);
        assert_eq!(
            result.rows,
            vec![OutputRow { label: "orig".into(), filename: "b_orig.mp4".into() }]
        );
    }

    /// A done status without outputs yields an empty group, not a crash.
    #[test]
    fn build_result_no_outputs() {
        let result = build_job_result("c.mp4", None, Some(1.0));
        assert!(result.rows.is_empty());
    }

    /// Row order follows the server's entry order.
    #[test]
    fn build_result_preserves_order() {
        let outputs: Map<String, Value> = serde_json::from_str(
            r#"{ "zz": "z.mp4", "aa": "a.mp4", "mm": "m.srt" }"#,
        )
        .unwrap();
        let result = build_job_result("d.mp4", Some(&outputs), None);
        let labels: Vec<&str> = result.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["zz", "aa", "mm"]);
    }

    /// Done and Failed are terminal; the in-flight phases are not.
    #[test]
    fn phase_terminality() {
        assert!(!JobPhase::Uploading.is_terminal());
        assert!(!JobPhase::Processing.is_terminal());
        assert!(JobPhase::Done.is_terminal());
        assert!(JobPhase::Failed("x".into()).is_terminal());
    }
}
