//! Download markdown documents over HTTP(S) for indexing.

use reqwest::{Client, StatusCode, Url};
use sha1::{Digest, Sha1};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url '{url}': {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("{url} is larger than {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("could not build http client: {0}")]
    Client(reqwest::Error),
}

impl FetchError {
    /// Transport failures, 5xx and 429 are worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request { .. } => true,
            FetchError::Status { status, .. } => status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: String,
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 12,
            max_retries: 3,
            user_agent: concat!("mdsearch/", env!("CARGO_PKG_VERSION")).to_string(),
            max_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDoc {
    pub url: String,
    /// Local file name suggested by the URL path.
    pub filename: String,
    pub content: String,
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, config })
    }

    pub async fn fetch(&self, raw: &str) -> Result<FetchedDoc, FetchError> {
        let url = Url::parse(raw).map_err(|source| FetchError::InvalidUrl { url: raw.to_string(), source })?;
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(&url).await {
                Ok(content) => {
                    tracing::info!(url = %url, bytes = content.len(), "fetched document");
                    return Ok(FetchedDoc { url: url.to_string(), filename: filename_for(&url), content });
                }
                Err(err) if attempt < self.config.max_retries && err.is_retryable() => {
                    let delay = backoff(attempt);
                    tracing::warn!(url = %url, attempt, error = %err, delay_ms = delay.as_millis() as u64, "fetch failed, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let request_err = |source| FetchError::Request { url: url.to_string(), source };
        let resp = self.client.get(url.clone()).send().await.map_err(request_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status });
        }
        let limit = self.config.max_bytes;
        if resp.content_length().map_or(false, |len| len as usize > limit) {
            return Err(FetchError::TooLarge { url: url.to_string(), limit });
        }
        let bytes = resp.bytes().await.map_err(request_err)?;
        if bytes.len() > limit {
            return Err(FetchError::TooLarge { url: url.to_string(), limit });
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// 250ms, 500ms, 1s, ... capped at 16s.
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250 * 2u64.pow(attempt.min(6)))
}

pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Last path segment, with `.md` appended when it has no extension; a SHA-1
/// of the URL when the path is empty.
pub fn filename_for(url: &Url) -> String {
    let last = url.path_segments().and_then(|s| s.last()).filter(|s| !s.is_empty());
    match last {
        Some(name) if name.contains('.') => name.to_string(),
        Some(name) => format!("{name}.md"),
        None => {
            let mut hasher = Sha1::new();
            hasher.update(url.as_str().as_bytes());
            format!("{:x}.md", hasher.finalize())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `responses` in order, one per connection, then repeat the last one.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses[n.min(responses.len() - 1)];
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(reply.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn quick_config() -> FetchConfig {
        FetchConfig { timeout_secs: 5, max_retries: 2, ..FetchConfig::default() }
    }

    #[test]
    fn names_files_after_url_path() {
        let u = Url::parse("https://example.com/docs/guide.md").unwrap();
        assert_eq!(filename_for(&u), "guide.md");
        let u = Url::parse("https://example.com/docs/README").unwrap();
        assert_eq!(filename_for(&u), "README.md");
        let u = Url::parse("https://example.com/").unwrap();
        let name = filename_for(&u);
        assert!(name.ends_with(".md"));
        assert_eq!(name.len(), 40 + 3);
    }

    #[test]
    fn recognizes_urls() {
        assert!(is_url("https://example.com/a.md"));
        assert!(is_url("http://localhost/a.md"));
        assert!(!is_url("docs/a.md"));
        assert!(!is_url("ftp://example.com/a.md"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_millis(250));
        assert_eq!(backoff(2), Duration::from_millis(1000));
        assert_eq!(backoff(20), backoff(6));
    }

    #[tokio::test]
    async fn fetches_document_body() {
        let (base, _) = serve(vec![(200, "# Title\n\nBody text")]).await;
        let fetcher = Fetcher::new(quick_config()).unwrap();
        let doc = fetcher.fetch(&format!("{base}/notes/intro.md")).await.unwrap();
        assert_eq!(doc.content, "# Title\n\nBody text");
        assert_eq!(doc.filename, "intro.md");
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let (base, hits) = serve(vec![(503, "busy"), (200, "ok now")]).await;
        let fetcher = Fetcher::new(quick_config()).unwrap();
        let doc = fetcher.fetch(&format!("{base}/a.md")).await.unwrap();
        assert_eq!(doc.content, "ok now");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let (base, hits) = serve(vec![(404, "missing")]).await;
        let fetcher = Fetcher::new(quick_config()).unwrap();
        let err = fetcher.fetch(&format!("{base}/a.md")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejects_oversized_bodies() {
        let (base, _) = serve(vec![(200, "0123456789")]).await;
        let fetcher = Fetcher::new(FetchConfig { max_bytes: 4, ..quick_config() }).unwrap();
        let err = fetcher.fetch(&format!("{base}/big.md")).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 4, .. }));
    }
}
