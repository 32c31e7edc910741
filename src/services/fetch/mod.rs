//! Retrying streamed downloads.
//!
//! Each attempt streams the response body straight to disk. Two timers bound
//! an attempt: the connect timeout covers connecting and receiving response
//! headers, the overall timeout covers the whole transfer. A failed attempt
//! never leaves a partial file behind.

mod partial;

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::models::RetryPolicy;
use crate::services::events::{EventSender, PipelineEvent};

use partial::PartialFile;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("osrm-prep/", env!("CARGO_PKG_VERSION"));

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Downloads one URL at a time with retries and exponential backoff.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    events: EventSender,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(policy.connect_timeout())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            policy,
            events: EventSender::disabled(),
        })
    }

    /// Report attempts and byte progress to `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Download `url` to `destination`, retrying per the policy.
    ///
    /// Makes at most `max_retries + 1` attempts. Every attempt rewrites the
    /// destination from the start; after the last failure the destination
    /// does not exist.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<Downloaded, FetchError> {
        let attempts = self.policy.total_attempts();
        let mut attempt = 0u32;

        loop {
            info!("Download attempt {}/{}: {}", attempt + 1, attempts, url);
            self.events
                .send(PipelineEvent::AttemptStarted {
                    url: url.to_string(),
                    attempt: attempt + 1,
                    attempts,
                })
                .await;

            let error = match self.fetch_once(url, destination).await {
                Ok(downloaded) => {
                    debug!(
                        "Downloaded {} bytes to {}",
                        downloaded.bytes,
                        downloaded.path.display()
                    );
                    self.events
                        .send(PipelineEvent::Downloaded {
                            bytes: downloaded.bytes,
                        })
                        .await;
                    return Ok(downloaded);
                }
                Err(e) => e,
            };

            warn!("Download attempt {} failed: {}", attempt + 1, error);

            let is_last = attempt + 1 >= attempts;
            let retry_in = (!is_last).then(|| self.policy.delay_after(attempt));
            self.events
                .send(PipelineEvent::AttemptFailed {
                    attempt: attempt + 1,
                    error: error.to_string(),
                    retry_in,
                })
                .await;

            match retry_in {
                Some(delay) => {
                    info!("Retrying in {:.1}s", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    return Err(FetchError::Exhausted {
                        attempts,
                        last: Box::new(error),
                    })
                }
            }
        }
    }

    /// One attempt under the overall timeout.
    async fn fetch_once(&self, url: &str, destination: &Path) -> Result<Downloaded, FetchError> {
        let limit = self.policy.timeout();
        let partial = PartialFile::create(destination).await?;

        // On timeout the transfer future is dropped together with the
        // partial file, which removes it.
        match tokio::time::timeout(limit, self.stream_to(url, partial)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(limit)),
        }
    }

    async fn stream_to(&self, url: &str, mut partial: PartialFile) -> Result<Downloaded, FetchError> {
        let connect_limit = self.policy.connect_timeout();
        let response = tokio::time::timeout(connect_limit, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::ConnectTimeout(connect_limit))?
            .map_err(FetchError::Request)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status { status });
        }

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchError::Transfer)?;
            partial.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
            self.events.try_send(PipelineEvent::Progress { bytes, total });
        }

        let path = partial.commit().await?;
        Ok(Downloaded { path, bytes })
    }
}
