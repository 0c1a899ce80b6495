//! Uploads run outputs to S3, optionally gzip-compressed.
//!
//! Objects land under `<prefix>/run=<stamp>/<file name>[.gz]`.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run stamp used in object keys, e.g. `2024-05-01T120000Z`.
pub fn run_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H%M%SZ").to_string()
}

pub fn object_key(prefix: &str, stamp: &str, file_name: &str, gzip: bool) -> String {
    let prefix = prefix.trim_matches('/');
    let suffix = if gzip { ".gz" } else { "" };
    if prefix.is_empty() {
        format!("run={stamp}/{file_name}{suffix}")
    } else {
        format!("{prefix}/run={stamp}/{file_name}{suffix}")
    }
}

fn content_type(file_name: &str, gzip: bool) -> &'static str {
    if gzip {
        return "application/gzip";
    }
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("md") => "text/markdown",
        _ => "application/octet-stream",
    }
}

/// Returns the upload body, gzip-compressed when `gzip` is set.
pub fn encode_body(contents: Vec<u8>, gzip: bool) -> Result<Vec<u8>> {
    if !gzip {
        return Ok(contents);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&contents)?;
    Ok(encoder.finish()?)
}

/// Uploads each file in `files` and returns the keys written.
#[tracing::instrument(skip(client, files), fields(files = files.len()))]
pub async fn publish_outputs(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    prefix: &str,
    stamp: &str,
    files: &[PathBuf],
    gzip: bool,
) -> Result<Vec<String>> {
    let mut keys = Vec::with_capacity(files.len());

    for path in files {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("not a file path: {}", path.display()))?;
        let contents =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let body = encode_body(contents, gzip)?;
        let key = object_key(prefix, stamp, file_name, gzip);

        debug!(key = %key, bytes = body.len(), "Uploading object");
        client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .content_type(content_type(file_name, gzip))
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("failed to upload s3://{bucket}/{key}"))?;

        keys.push(key);
    }

    info!(upload_count = keys.len(), "S3 upload complete");
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_object_key() {
        let stamp = run_stamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 7).unwrap());
        assert_eq!(stamp, "2024-05-01T120007Z");
        assert_eq!(
            object_key("quality/", &stamp, "metrics.json", false),
            "quality/run=2024-05-01T120007Z/metrics.json"
        );
        assert_eq!(
            object_key("", &stamp, "products_clean.csv", true),
            "run=2024-05-01T120007Z/products_clean.csv.gz"
        );
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("a.csv", false), "text/csv");
        assert_eq!(content_type("report.md", false), "text/markdown");
        assert_eq!(content_type("a.csv", true), "application/gzip");
    }

    #[test]
    fn test_encode_body_gzip() {
        let raw = b"code,brands\n1,acme\n".to_vec();
        assert_eq!(encode_body(raw.clone(), false).unwrap(), raw);

        let gz = encode_body(raw.clone(), true).unwrap();
        let mut decoded = Vec::new();
        GzDecoder::new(gz.as_slice()).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, raw);
    }
}
