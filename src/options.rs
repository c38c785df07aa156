/// Transcription backends supported by the server.
///
/// The set is closed on purpose: an unknown backend string from config or
/// a stale form state fails at [`ModelBackend::from_wire`] instead of
/// silently producing an empty model list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelBackend {
    /// The faster-whisper (CTranslate2) engine
    FasterWhisper,
    /// The reference openai-whisper engine
    OpenAiWhisper,
}

/// Model names accepted by faster-whisper, in selector order.
const FASTER_WHISPER_MODELS: &[&str] = &[
    "tiny", "base", "small", "medium", "large-v1", "large-v2", "large-v3", "large",
];

/// Model names accepted by openai-whisper, in selector order.
const OPENAI_WHISPER_MODELS: &[&str] = &[
    "tiny", "tiny.en", "base", "base.en", "small", "small.en", "medium", "medium.en",
    "large", "large-v1", "large-v2", "large-v3", "large-v3-turbo", "turbo",
];

impl ModelBackend {
    /// Every backend, in selector order.
    pub const ALL: [ModelBackend; 2] = [ModelBackend::FasterWhisper, ModelBackend::OpenAiWhisper];

    /// The form-field value the server expects for this backend.
    pub fn wire_name(self) -> &'static str {
        match self {
            ModelBackend::FasterWhisper => "faster-whisper",
            ModelBackend::OpenAiWhisper => "openai-whisper",
        }
    }

    /// Parse a backend form-field value; `None` for anything unrecognized.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "faster-whisper" => Some(ModelBackend::FasterWhisper),
            "openai-whisper" => Some(ModelBackend::OpenAiWhisper),
            _ => None,
        }
    }

    /// Ordered model names valid for this backend.
    pub fn model_options(self) -> &'static [&'static str] {
        match self {
            ModelBackend::FasterWhisper => FASTER_WHISPER_MODELS,
            ModelBackend::OpenAiWhisper => OPENAI_WHISPER_MODELS,
        }
    }

    /// Selection after the model list is reset for this backend.
    pub fn default_model(self) -> &'static str {
        self.model_options()[0]
    }
}

/// Processing devices offered by the form; "auto" lets the server pick.
pub const PROCESSOR_OPTIONS: &[&str] = &["auto", "cpu", "cuda", "videotoolbox"];

/// How subtitles end up in the output: burned into pixels, muxed as a
/// soft track, or left as standalone .srt files.
pub const BURN_TYPE_OPTIONS: &[&str] = &["hard", "soft", "none"];

#[cfg(test)]
mod tests {
    use super::*;

    /// The faster-whisper list matches the server's accepted set, in order.
    #[test]
    fn faster_whisper_models_exact() {
        assert_eq!(
            ModelBackend::FasterWhisper.model_options(),
            &["tiny", "base", "small", "medium", "large-v1", "large-v2", "large-v3", "large"]
        );
    }

    /// The openai-whisper list matches the server's accepted set, in order.
    #[test]
    fn openai_whisper_models_exact() {
        assert_eq!(
            ModelBackend::OpenAiWhisper.model_options(),
            &[
                "tiny", "tiny.en", "base", "base.en", "small", "small.en", "medium", "medium.en",
                "large", "large-v1", "large-v2", "large-v3", "large-v3-turbo", "turbo"
            ]
        );
    }

    /// Resetting the selector lands on the first entry of the new list.
    #[test]
    fn default_model_is_first_entry() {
        for backend in ModelBackend::ALL {
            assert_eq!(backend.default_model(), backend.model_options()[0]);
        }
    }

    /// Wire names round-trip and unknown backends are rejected at the parse
    /// boundary rather than yielding an empty list.
    #[test]
    fn wire_name_round_trip() {
        for backend in ModelBackend::ALL {
            assert_eq!(ModelBackend::from_wire(backend.wire_name()), Some(backend));
        }
        assert_eq!(ModelBackend::from_wire("whisper-cpp"), None);
        assert_eq!(ModelBackend::from_wire(""), None);
    }
}
