use super::progress::ProgressReporter;
use crate::errors::{IoContext, ProvisionError};
use data_encoding::HEXLOWER;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const READ_TIMEOUT: Duration = Duration::from_secs(120);
const CHUNK_LEN: usize = 32 * 1024;

pub const DOWNLOAD_START_PERCENT: u8 = 15;
pub const DOWNLOAD_END_PERCENT: u8 = 75;

/// Where the image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Remote(String),
    Local(PathBuf),
}

impl ImageSource {
    /// `file://` URLs and absolute paths refer to an archive already on disk
    pub fn parse(url: &str) -> Self {
        if let Some(path) = url.strip_prefix("file://") {
            ImageSource::Local(PathBuf::from(path))
        } else if url.starts_with('/') {
            ImageSource::Local(PathBuf::from(url))
        } else {
            ImageSource::Remote(url.to_string())
        }
    }
}

/// Download share of the overall setup, proportional to bytes transferred
pub fn download_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return DOWNLOAD_START_PERCENT;
    }
    let span = (DOWNLOAD_END_PERCENT - DOWNLOAD_START_PERCENT) as u64;
    let offset = done.min(total) * span / total;
    DOWNLOAD_START_PERCENT + offset as u8
}

/**
 * Fetch the image to `dest`, returning its lowercase hex sha256. Progress is
 * only reported proportionally when the size is known up front.
 */
pub(crate) fn fetch_image(
    source: &ImageSource,
    dest: &Path,
    reporter: &mut ProgressReporter,
) -> Result<String, ProvisionError> {
    match source {
        ImageSource::Local(path) => {
            info!("Copying image from {}", path.display());
            let file = File::open(path)
                .during(format!("opening image {}", path.display()))?;
            let total = file.metadata().ok().map(|m| m.len());
            stream_to_file(file, total, dest, reporter)
        }
        ImageSource::Remote(url) => {
            info!("Downloading image from {}", url);
            let client = reqwest::blocking::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(READ_TIMEOUT)
                .build()?;
            let response = client.get(url).send()?.error_for_status()?;
            let total = response.content_length();
            debug!("Image content length: {:?}", total);
            stream_to_file(response, total, dest, reporter)
        }
    }
}

pub(crate) fn stream_to_file<R: Read>(
    mut reader: R,
    total: Option<u64>,
    dest: &Path,
    reporter: &mut ProgressReporter,
) -> Result<String, ProvisionError> {
    let file = File::create(dest)
        .during(format!("creating {}", dest.display()))?;
    let mut out = BufWriter::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_LEN];
    let mut downloaded: u64 = 0;

    loop {
        reporter.check_cancelled()?;
        let len = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProvisionError::io("reading image", e)),
        };
        out.write_all(&buf[..len])
            .during(format!("writing {}", dest.display()))?;
        hasher.update(&buf[..len]);
        downloaded += len as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            reporter.report(
                format!("Downloading... {}KB", downloaded / 1024),
                download_percent(downloaded, total),
            );
        }
    }
    out.flush().during(format!("writing {}", dest.display()))?;

    let digest = HEXLOWER.encode(&hasher.finalize());
    debug!("Fetched {} bytes, sha256:{}", downloaded, digest);
    Ok(digest)
}

pub(crate) fn verify_digest(
    expected: Option<&str>,
    found: &str,
) -> Result<(), ProvisionError> {
    match expected {
        Some(expected) if !expected.eq_ignore_ascii_case(found) => {
            Err(ProvisionError::DigestMismatch {
                expected: expected.to_lowercase(),
                found: found.to_string(),
            })
        }
        _ => Ok(()),
    }
}
