use super::{ApiError, Backend};
use crate::model::{
    JobStatus, Mode, ProcessRequest, ProcessResponse, RunConfig, SearchRequest, SearchResponse,
    SearchResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// reqwest-backed client for the Basket service.
#[derive(Clone)]
pub struct BasketClient {
    http: reqwest::Client,
    base_url: String,
}

impl BasketClient {
    pub fn new(cfg: &RunConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(&cfg.base_url),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &'static str,
        resp: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { endpoint, source })
    }
}

/// Strip trailing slashes so paths can be appended verbatim.
pub(crate) fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[async_trait]
impl Backend for BasketClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        tracing::debug!(query, "POST /search");
        let resp = self
            .http
            .post(self.endpoint("/search"))
            .json(&SearchRequest { query })
            .send()
            .await?;
        let body: SearchResponse = Self::decode("/search", resp).await?;
        Ok(body.results)
    }

    async fn process(&self, video_id: &str, mode: Mode) -> Result<ProcessResponse, ApiError> {
        tracing::debug!(video_id, %mode, "POST /process");
        let resp = self
            .http
            .post(self.endpoint("/process"))
            .json(&ProcessRequest { video_id, mode })
            .send()
            .await?;
        Self::decode("/process", resp).await
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        let resp = self
            .http
            .get(self.endpoint(&format!("/status/{job_id}")))
            .send()
            .await?;
        Self::decode("/status", resp).await
    }

    async fn download(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let resp = self.http.get(self.download_url(job_id)).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                endpoint: "/download",
                status: resp.status().as_u16(),
            });
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| ApiError::Io { path, source }
        };

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(io_err(dest_dir))?;
        let path = dest_dir.join(format!("{job_id}.mp3"));
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(io_err(&path))?;

        let mut written = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk: Bytes = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(io_err(&path))?;
        }
        file.flush().await.map_err(io_err(&path))?;

        tracing::info!(job_id, bytes = written, path = %path.display(), "download saved");
        Ok(path)
    }

    fn download_url(&self, job_id: &str) -> String {
        self.endpoint(&format!("/download/{job_id}"))
    }

    fn media_url(&self, path: Option<&str>, job_id: &str) -> String {
        match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) if p.starts_with("http://") || p.starts_with("https://") => p.to_string(),
            Some(p) if p.starts_with('/') => self.endpoint(p),
            Some(p) => self.endpoint(&format!("/{p}")),
            None => self.download_url(job_id),
        }
    }
}
