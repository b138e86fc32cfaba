//! Tardis replay downloads.
//!
//! The replay service serves one minute of a captured feed per request as
//! gzip-compressed NDJSON. [`cache_capture`] drives a [`ReplayClient`] over a
//! whole day and stores every minute as `<capture>/<HH>/<MM>.json.gz`, which
//! is the layout the aggregation pipeline reads.

use std::path::{Path, PathBuf};

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::header::ACCEPT_ENCODING;
use serde_json::json;
use time::{Date, OffsetDateTime};

use crate::error::Result;
use crate::layout::{iso_date, CacheLayout, CaptureLayout, MINUTES_PER_DAY};
use crate::schema::requested_message_type;

pub const DEFAULT_ENDPOINT: &str = "https://api.tardis.dev/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub exchange: String,
    pub date: Date,
    pub message_type: &'static str,
    pub symbols: Vec<String>,
    pub api_key: Option<String>,
    /// Minutes of the day to fetch, starting at midnight UTC.
    pub minutes: u32,
}

impl DownloadRequest {
    /// Full-day request; the message type comes from the exchange's schema.
    pub fn for_exchange(exchange: &str, date: Date, symbols: Vec<String>) -> Result<Self> {
        Ok(Self {
            exchange: exchange.to_string(),
            date,
            message_type: requested_message_type(exchange)?,
            symbols,
            api_key: None,
            minutes: MINUTES_PER_DAY,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_minutes(mut self, minutes: u32) -> Self {
        self.minutes = minutes.min(MINUTES_PER_DAY);
        self
    }

    pub fn filters_json(&self) -> String {
        json!([{ "channel": self.message_type, "symbols": self.symbols }]).to_string()
    }
}

/// One minute slice present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceCached {
    pub minute: u32,
    pub path: PathBuf,
    pub bytes: u64,
    /// The slice was already on disk and not fetched again.
    pub from_cache: bool,
}

pub trait ReplayClient {
    /// Stores every requested minute under `capture_dir`, yielding slices in
    /// minute order.
    fn replay<'a>(
        &'a self,
        request: &'a DownloadRequest,
        capture_dir: &'a Path,
    ) -> BoxStream<'a, Result<SliceCached>>;
}

pub struct TardisHttpClient {
    client: reqwest::Client,
    endpoint: String,
}

impl TardisHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_minute(
        &self,
        request: &DownloadRequest,
        capture: &CaptureLayout,
        minute: u32,
    ) -> Result<SliceCached> {
        let path = capture.slice_path(minute)?;
        if let Ok(meta) = tokio::fs::metadata(&path).await {
            if meta.is_file() {
                return Ok(SliceCached {
                    minute,
                    path,
                    bytes: meta.len(),
                    from_cache: true,
                });
            }
        }

        let url = format!("{}/data-feeds/{}", self.endpoint, request.exchange);
        let mut builder = self
            .client
            .get(&url)
            .header(ACCEPT_ENCODING, "gzip")
            .query(&[
                ("from", iso_date(request.date)),
                ("offset", minute.to_string()),
                ("filters", request.filters_json()),
            ]);
        if let Some(api_key) = &request.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let resp = builder.send().await?;
        let resp = resp.error_for_status()?;
        let body = resp.bytes().await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("gz.tmp");
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("fetched {} ({} bytes)", path.display(), body.len());

        Ok(SliceCached {
            minute,
            path,
            bytes: body.len() as u64,
            from_cache: false,
        })
    }
}

impl ReplayClient for TardisHttpClient {
    fn replay<'a>(
        &'a self,
        request: &'a DownloadRequest,
        capture_dir: &'a Path,
    ) -> BoxStream<'a, Result<SliceCached>> {
        let capture = CaptureLayout::new(capture_dir);
        stream::iter(0..request.minutes)
            .then(move |minute| {
                let capture = capture.clone();
                async move { self.fetch_minute(request, &capture, minute).await }
            })
            .boxed()
    }
}

/// Creates a fresh capture directory under `cache_root` and fills it through
/// `client`. Returns the capture directory.
pub async fn cache_capture<C>(
    client: &C,
    request: &DownloadRequest,
    cache_root: &Path,
) -> Result<PathBuf>
where
    C: ReplayClient + ?Sized,
{
    let capture = CacheLayout::new(cache_root).capture_dir(
        &request.exchange,
        request.date,
        OffsetDateTime::now_utc(),
    )?;
    tokio::fs::create_dir_all(capture.root()).await?;
    info!(
        "{}: caching {} for {} into {}",
        request.exchange,
        request.message_type,
        iso_date(request.date),
        capture.root().display()
    );

    let mut fetched = 0usize;
    let mut reused = 0usize;
    let mut bytes = 0u64;
    let mut slices = client.replay(request, capture.root());
    while let Some(slice) = slices.next().await {
        let slice = slice?;
        if slice.from_cache {
            reused += 1;
        } else {
            fetched += 1;
        }
        bytes += slice.bytes;
    }
    info!(
        "{}: cached {fetched} fetched + {reused} reused slices ({bytes} bytes)",
        request.exchange
    );
    Ok(capture.root().to_path_buf())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::error::Error;

    #[test]
    fn request_takes_message_type_from_registry() {
        let request =
            DownloadRequest::for_exchange("okex-swap", date!(2020 - 09 - 01), vec!["BTC-USD-SWAP".into()])
                .unwrap();
        assert_eq!(request.message_type, "swap/trade");
        assert_eq!(request.minutes, MINUTES_PER_DAY);
        assert_eq!(
            request.filters_json(),
            r#"[{"channel":"swap/trade","symbols":["BTC-USD-SWAP"]}]"#
        );
        assert_eq!(request.with_minutes(5000).minutes, MINUTES_PER_DAY);
    }

    #[test]
    fn request_for_unknown_exchange_fails() {
        let err = DownloadRequest::for_exchange("mtgox", date!(2020 - 09 - 01), Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownExchange { .. }));
    }

    #[tokio::test]
    async fn slices_on_disk_are_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let capture = CaptureLayout::new(dir.path());
        for minute in 0..3 {
            let path = capture.slice_path(minute).unwrap();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"cached").unwrap();
        }
        // Nothing listens here; any request would fail.
        let client = TardisHttpClient::with_endpoint("http://127.0.0.1:9/").unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9");
        let request = DownloadRequest::for_exchange("kraken", date!(2020 - 09 - 01), Vec::new())
            .unwrap()
            .with_minutes(3);

        let slices: Vec<_> = client
            .replay(&request, dir.path())
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|s| s.from_cache && s.bytes == 6));
        assert_eq!(slices[2].path, dir.path().join("00/02.json.gz"));
    }
}
