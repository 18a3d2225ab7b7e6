use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, StatusCode};
use tracing::debug;

use crate::decoder::decode_message;
use crate::error::{FetchError, GribError};
use crate::field::Field;

/// Response body caps. Real HRRR `.idx` files are around 200 KB and
/// single fields around 600 KB; the caps bound peak memory if a
/// misbehaving server streams an enormous body.
pub(crate) const MAX_IDX_BYTES: usize = 10 << 20;
pub(crate) const MAX_MESSAGE_BYTES: usize = 50 << 20;

const DEFAULT_BASE_URL: &str = "https://noaa-hrrr-bdp-pds.s3.amazonaws.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// An inclusive byte range within a remote GRIB2 file. `end` of `None`
/// means "through end of file" — a distinct state, since 0 is a valid
/// byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Fetches HRRR GRIB2 messages from the NOAA S3 bucket.
///
/// Every operation is an ordinary future: dropping it cancels the
/// in-flight request, and the underlying client enforces a hard request
/// timeout.
#[derive(Debug, Clone)]
pub struct HrrrClient {
    http: reqwest::Client,
    base_url: String,
}

impl HrrrClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetches and decodes a single field for a model run (UTC, truncated
    /// to the hour by the URL format), forecast hour and index search
    /// string such as `"TMP:700 mb"`.
    pub async fn fetch_field(
        &self,
        run: DateTime<Utc>,
        fxx: u8,
        var_level: &str,
    ) -> Result<Field, GribError> {
        let (idx_url, grib_url) = self.urls(run, fxx);
        let index = self.fetch_index(&idx_url).await?;
        let range = find_byte_range(&index, var_level)?;
        debug!(start = range.start, end = ?range.end, var_level, "resolved byte range");
        let raw = self.fetch_range(&grib_url, &range).await?;
        decode_message(&raw)
    }

    /// Ranged fetch for callers that already know the byte offsets of a
    /// message.
    pub async fn fetch_raw(&self, url: &str, range: &ByteRange) -> Result<Vec<u8>, FetchError> {
        self.fetch_range(url, range).await
    }

    fn urls(&self, run: DateTime<Utc>, fxx: u8) -> (String, String) {
        let base = format!(
            "{}/hrrr.{}/conus/hrrr.t{}z.wrfsfcf{fxx:02}.grib2",
            self.base_url,
            run.format("%Y%m%d"),
            run.format("%H"),
        );
        (format!("{base}.idx"), base)
    }

    async fn fetch_index(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "fetching index");
        let body = self.fetch_limited(self.http.get(url), url, MAX_IDX_BYTES).await?;
        String::from_utf8(body).map_err(|e| FetchError::Request(e.to_string()))
    }

    async fn fetch_range(&self, url: &str, range: &ByteRange) -> Result<Vec<u8>, FetchError> {
        debug!(url, range = %range.header_value(), "fetching message bytes");
        let req = self.http.get(url).header(header::RANGE, range.header_value());
        self.fetch_limited(req, url, MAX_MESSAGE_BYTES).await
    }

    /// Sends a request and reads the body as a size-capped stream, so a
    /// huge response fails fast instead of exhausting memory.
    async fn fetch_limited(
        &self,
        req: reqwest::RequestBuilder,
        url: &str,
        limit: usize,
    ) -> Result<Vec<u8>, FetchError> {
        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Request(e.to_string()))?;
            if body.len() + chunk.len() > limit {
                return Err(FetchError::BodyTooLarge {
                    limit,
                    url: url.to_string(),
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Selects the byte range of `var_level` from an HRRR `.idx` file.
///
/// Index lines are colon-delimited: message number, byte offset,
/// reference time, variable, level, forecast. The search string is
/// matched as a substring of the whole line; the range ends one byte
/// before the next line's offset, or at end of file for the last entry.
pub fn find_byte_range(index: &str, var_level: &str) -> Result<ByteRange, FetchError> {
    let lines: Vec<&str> = index.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if !line.contains(var_level) {
            continue;
        }
        let mut parts = line.split(':');
        let _message_number = parts.next();
        let start = match parts.next().and_then(|s| s.trim().parse::<u64>().ok()) {
            Some(v) => v,
            None => continue,
        };
        if parts.next().is_none() {
            continue;
        }
        let end = lines
            .get(i + 1)
            .and_then(|next| next.split(':').nth(1))
            .and_then(|s| s.trim().parse::<u64>().ok())
            .and_then(|next_start| next_start.checked_sub(1));
        return Ok(ByteRange { start, end });
    }
    Err(FetchError::VariableNotFound(var_level.to_string()))
}
