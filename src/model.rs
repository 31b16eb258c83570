use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
    pub download_dir: PathBuf,
}

/// One entry of a search response. Defaults mirror what the backend fills in
/// when the source has no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    #[serde(default = "unknown_uploader", deserialize_with = "uploader_or_unknown")]
    pub uploader: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnail: String,
    #[serde(default)]
    pub url: Option<String>,
}

fn unknown_uploader() -> String {
    "Unknown".to_string()
}

// Live streams and some extractors send explicit nulls.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn uploader_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_uploader))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Audio,
    Video,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Audio => "audio",
            Mode::Video => "video",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Ready,
    Blocked,
    Failed,
}

/// Terminal artifact of one search/fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResult {
    pub kind: MediaKind,
    /// Playable URL for audio, embed URL for video.
    pub url: String,
    #[serde(default)]
    pub download_url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: MediaStatus,
}

/// Summary of one completed headless fetch, printed or exported as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchReport {
    pub timestamp_utc: String,
    pub base_url: String,
    pub query: String,
    pub mode: Mode,
    pub result: SearchResult,
    pub media: MediaResult,
    #[serde(default)]
    pub saved_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest<'a> {
    pub video_id: &'a str,
    pub mode: Mode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        JobState::parse(&self.status)
    }
}

/// Classification of the raw job status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Downloading,
    Processing,
    Ready,
    Failed,
    Other(String),
}

impl JobState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => JobState::Queued,
            "downloading" => JobState::Downloading,
            "processing" => JobState::Processing,
            "ready" => JobState::Ready,
            "failed" => JobState::Failed,
            _ => JobState::Other(raw.to_string()),
        }
    }

    /// Short human-readable label for busy indicators.
    pub fn label(&self) -> &str {
        match self {
            JobState::Queued => "Queued",
            JobState::Downloading => "Downloading",
            JobState::Processing => "Processing",
            JobState::Ready => "Ready",
            JobState::Failed => "Failed",
            JobState::Other(s) => s.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_fills_backend_defaults() {
        let r: SearchResult =
            serde_json::from_str(r#"{"id":"abc","title":"Song"}"#).expect("decode");
        assert_eq!(r.uploader, "Unknown");
        assert_eq!(r.duration, 0);
        assert_eq!(r.thumbnail, "");
        assert!(r.url.is_none());
    }

    #[test]
    fn search_result_treats_nulls_as_missing() {
        let r: SearchResult = serde_json::from_str(
            r#"{"id":"live","title":"Stream","uploader":null,"duration":null,"thumbnail":null,"url":null}"#,
        )
        .expect("decode");
        assert_eq!(r.uploader, "Unknown");
        assert_eq!(r.duration, 0);
        assert_eq!(r.thumbnail, "");
        assert!(r.url.is_none());
    }

    #[test]
    fn mode_serializes_lowercase() {
        let body = serde_json::to_value(ProcessRequest {
            video_id: "abc",
            mode: Mode::Video,
        })
        .expect("encode");
        assert_eq!(body, serde_json::json!({"video_id": "abc", "mode": "video"}));
    }

    #[test]
    fn job_state_only_recognises_known_values() {
        assert_eq!(JobState::parse("READY"), JobState::Ready);
        assert_eq!(JobState::parse("failed"), JobState::Failed);
        assert_eq!(JobState::parse("downloading"), JobState::Downloading);
        assert_eq!(
            JobState::parse("pending"),
            JobState::Other("pending".to_string())
        );
    }
}
