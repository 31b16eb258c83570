//! HTTP contract of the Basket service.
//!
//! The orchestrator talks to the service only through [`Backend`], so tests can
//! script responses without a network.

mod http;

pub use http::BasketClient;

use crate::model::{JobStatus, Mode, ProcessResponse, SearchResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: u16,
    },
    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// `POST /search`. Results are returned in server order.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError>;

    /// `POST /process` for one search result.
    async fn process(&self, video_id: &str, mode: Mode) -> Result<ProcessResponse, ApiError>;

    /// `GET /status/{job_id}`.
    async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError>;

    /// `GET /download/{job_id}` saved as `<dest_dir>/<job_id>.mp3`.
    async fn download(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf, ApiError>;

    /// Absolute download endpoint for a job.
    fn download_url(&self, job_id: &str) -> String;

    /// Playable URL for a finished job: the server-given path resolved against
    /// the base URL, or the download endpoint when the server gave none.
    fn media_url(&self, path: Option<&str>, job_id: &str) -> String;
}
