//! Scripted in-memory backend shared by orchestrator tests.

use crate::backend::{ApiError, Backend};
use crate::model::{JobStatus, Mode, ProcessResponse, SearchResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn status(s: &str) -> JobStatus {
    JobStatus {
        status: s.to_string(),
        ..Default::default()
    }
}

pub fn result(id: &str) -> SearchResult {
    SearchResult {
        id: id.to_string(),
        title: format!("Title {id}"),
        uploader: "Uploader".to_string(),
        duration: 200,
        thumbnail: String::new(),
        url: None,
    }
}

fn scripted_failure(endpoint: &'static str) -> ApiError {
    ApiError::Status {
        endpoint,
        status: 500,
    }
}

/// `None` entries script a transport failure. Once the status script runs dry
/// every further status is `pending`.
#[derive(Default)]
pub struct FakeBackend {
    pub search_results: Mutex<Option<Vec<SearchResult>>>,
    pub search_delay: Duration,
    pub process_response: Mutex<Option<ProcessResponse>>,
    pub process_delay: Duration,
    pub statuses: Mutex<VecDeque<Option<JobStatus>>>,
    pub search_calls: AtomicUsize,
    pub process_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub process_requests: Mutex<Vec<(String, Mode)>>,
}

impl FakeBackend {
    pub fn with_results(self, results: Vec<SearchResult>) -> Self {
        *self.search_results.lock().unwrap() = Some(results);
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    pub fn with_process(self, resp: ProcessResponse) -> Self {
        *self.process_response.lock().unwrap() = Some(resp);
        self
    }

    pub fn with_process_delay(mut self, delay: Duration) -> Self {
        self.process_delay = delay;
        self
    }

    pub fn with_statuses(self, script: impl IntoIterator<Item = Option<JobStatus>>) -> Self {
        self.statuses.lock().unwrap().extend(script);
        self
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }
        self.search_results
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| scripted_failure("/search"))
    }

    async fn process(&self, video_id: &str, mode: Mode) -> Result<ProcessResponse, ApiError> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.process_requests
            .lock()
            .unwrap()
            .push((video_id.to_string(), mode));
        if !self.process_delay.is_zero() {
            tokio::time::sleep(self.process_delay).await;
        }
        self.process_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| scripted_failure("/process"))
    }

    async fn status(&self, _job_id: &str) -> Result<JobStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().unwrap().pop_front() {
            Some(Some(s)) => Ok(s),
            Some(None) => Err(scripted_failure("/status")),
            None => Ok(status("pending")),
        }
    }

    async fn download(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let path = dest_dir.join(format!("{job_id}.mp3"));
        tokio::fs::write(&path, b"ID3")
            .await
            .map_err(|source| ApiError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    fn download_url(&self, job_id: &str) -> String {
        format!("http://fake/download/{job_id}")
    }

    fn media_url(&self, path: Option<&str>, job_id: &str) -> String {
        match path {
            Some(p) => format!("http://fake{p}"),
            None => self.download_url(job_id),
        }
    }
}
