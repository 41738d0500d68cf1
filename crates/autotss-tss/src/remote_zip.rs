//! Read a single entry out of a remote zip archive using HTTP range requests.
//!
//! Firmware archives are several gigabytes; the manifest is a few hundred
//! kilobytes near the end of the central directory. [`HttpRangeReader`]
//! exposes the remote object as `Read + Seek` so `zip::ZipArchive` only
//! pulls the bytes it touches.
//!
//! Everything here is blocking. Call it from `spawn_blocking`.

use std::io::{self, Read, Seek, SeekFrom};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{Result, TssError};

/// Bytes fetched per range request.
const CHUNK: u64 = 256 * 1024;

/// Upper bound on an extracted manifest. Real ones are well under 1 MiB.
const MAX_MANIFEST_BYTES: u64 = 16 << 20;

pub struct HttpRangeReader {
    client: Client,
    url: String,
    len: u64,
    pos: u64,
    buf: Vec<u8>,
    buf_start: u64,
}

impl HttpRangeReader {
    /// Probe the object size with a one-byte range request.
    pub fn open(client: Client, url: &str) -> Result<Self> {
        let resp = client.get(url).header(RANGE, "bytes=0-0").send()?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(TssError::RangeUnsupported {
                url: url.to_string(),
            });
        }
        let len = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(total_from_content_range)
            .ok_or_else(|| TssError::RangeUnsupported {
                url: url.to_string(),
            })?;
        debug!(url, len, "remote archive opened");

        Ok(Self {
            client,
            url: url.to_string(),
            len,
            pos: 0,
            buf: Vec::new(),
            buf_start: 0,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn fill(&mut self) -> io::Result<()> {
        let end = (self.pos + CHUNK).min(self.len) - 1;
        let resp = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={}-{}", self.pos, end))
            .send()
            .map_err(io::Error::other)?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(io::Error::other(format!(
                "range request to {} returned {}",
                self.url,
                resp.status()
            )));
        }
        let bytes = resp.bytes().map_err(io::Error::other)?;
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty range response",
            ));
        }
        self.buf = bytes.to_vec();
        self.buf_start = self.pos;
        Ok(())
    }

    fn buffered(&self) -> Option<&[u8]> {
        let end = self.buf_start + self.buf.len() as u64;
        if self.pos >= self.buf_start && self.pos < end {
            Some(&self.buf[(self.pos - self.buf_start) as usize..])
        } else {
            None
        }
    }
}

impl Read for HttpRangeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || self.pos >= self.len {
            return Ok(0);
        }
        if self.buffered().is_none() {
            self.fill()?;
        }
        let avail = self.buffered().unwrap_or(&[]);
        let n = avail.len().min(out.len());
        out[..n].copy_from_slice(&avail[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeReader {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let next = match target {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        match next {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of archive",
            )),
        }
    }
}

/// `bytes 0-0/1234` -> `1234`.
fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Download the first archive entry whose name contains `BuildManifest`.
pub fn extract_manifest(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("autotss/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let reader = HttpRangeReader::open(client, url)?;
    let mut archive = zip::ZipArchive::new(reader)?;

    let name = archive
        .file_names()
        .find(|n| n.contains("BuildManifest"))
        .map(str::to_string)
        .ok_or_else(|| TssError::ManifestNotInArchive {
            url: url.to_string(),
        })?;

    let mut entry = archive.by_name(&name)?;
    let declared = entry.size();
    let bytes = read_capped(&mut entry, declared, MAX_MANIFEST_BYTES)?.ok_or_else(|| {
        TssError::ManifestTooLarge {
            url: url.to_string(),
            limit: MAX_MANIFEST_BYTES,
        }
    })?;
    debug!(url, entry = %name, size = bytes.len(), "manifest extracted");
    Ok(bytes)
}

/// Read at most `limit` bytes. `None` when the source holds more. The
/// declared size only sizes the initial buffer and is not trusted.
fn read_capped<R: Read>(reader: R, declared: u64, limit: u64) -> io::Result<Option<Vec<u8>>> {
    let mut bytes = Vec::with_capacity(declared.min(limit) as usize);
    reader.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(bytes))
}
