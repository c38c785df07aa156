use serde::Deserialize;

/// Response body of the `/analyze` endpoint.
#[derive(Debug, Deserialize)]
pub struct AnalyzeResponse {
    /// Streams discovered inside the uploaded container
    #[serde(default)]
    pub tracks: Vec<TrackDescriptor>,
}

/// One audio or subtitle stream reported by the server's probe.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrackDescriptor {
    /// Stream index within the container
    pub index: u32,
    /// Whether this is an audio or a subtitle stream
    #[serde(rename = "type")]
    pub kind: TrackKind,
    /// ISO language tag, if the container carries one
    #[serde(default)]
    pub lang: Option<String>,
    /// Codec name as reported by the probe (e.g. "aac", "subrip")
    pub codec: String,
    /// Whether the container marks this stream as the default for its kind
    #[serde(rename = "default", default)]
    pub is_default: bool,
}

/// Stream kinds the analyzer reports.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Subtitle,
}

impl TrackDescriptor {
    /// Selector label: `#<index> - <language> [<codec>]`, with a
    /// ` (default)` marker when the container flags the stream as default.
    /// A missing language tag renders as "und".
    pub fn label(&self) -> String {
        let lang = self.lang.as_deref().unwrap_or("und");
        let mut label = format!("#{} - {} [{}]", self.index, lang, self.codec);
        if self.is_default {
            label.push_str(" (default)");
        }
        label
    }
}

/// Split descriptors into (audio, subtitle) selector lists, preserving
/// the server's ordering within each kind.
pub fn partition_tracks(tracks: &[TrackDescriptor]) -> (Vec<TrackDescriptor>, Vec<TrackDescriptor>) {
    let mut audio = Vec::new();
    let mut subtitle = Vec::new();
    for track in tracks {
        match track.kind {
            TrackKind::Audio => audio.push(track.clone()),
            TrackKind::Subtitle => subtitle.push(track.clone()),
        }
    }
    (audio, subtitle)
}
