//! Core domain types for Wayback snapshot mirrors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, WarpError};

/// Current schema version for the mirror manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Scheme and host of the public Wayback Machine.
pub const DEFAULT_ARCHIVE_ORIGIN: &str = "https://web.archive.org";

/// Capture timestamp mirrored when nothing else is configured.
pub const DEFAULT_TIMESTAMP: &str = "20250408214013";

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One timestamped capture on an archive service.
///
/// Every URL that starts with [`Snapshot::prefix`] belongs to the snapshot,
/// including modifier variants such as `<timestamp>im_/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    origin: Url,
    timestamp: String,
}

impl Snapshot {
    /// Build a snapshot from an archive origin (`https://web.archive.org`)
    /// and a 14-digit capture timestamp.
    pub fn new(origin: &str, timestamp: &str) -> Result<Self> {
        let origin = Url::parse(origin.trim_end_matches('/'))
            .map_err(|e| WarpError::validation(format!("invalid archive origin '{origin}': {e}")))?;

        if origin.scheme() != "http" && origin.scheme() != "https" {
            return Err(WarpError::validation(format!(
                "archive origin must be http or https, got '{}'",
                origin.scheme()
            )));
        }
        if origin.host_str().is_none() {
            return Err(WarpError::validation("archive origin has no host"));
        }
        if timestamp.len() != 14 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WarpError::validation(format!(
                "snapshot timestamp must be 14 digits, got '{timestamp}'"
            )));
        }

        Ok(Self {
            origin,
            timestamp: timestamp.to_string(),
        })
    }

    /// Scheme + host (+ port) of the archive, without a trailing slash.
    pub fn origin(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    /// Scheme of the archive origin (`https` for the public Wayback Machine).
    pub fn scheme(&self) -> &str {
        self.origin.scheme()
    }

    /// Host (and non-default port) of the archive, e.g. `web.archive.org`.
    pub fn authority(&self) -> String {
        let host = self.origin.host_str().unwrap_or_default();
        match self.origin.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// The 14-digit capture timestamp.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// `<origin>/web/<timestamp>`.
    pub fn prefix(&self) -> String {
        format!("{}/web/{}", self.origin(), self.timestamp)
    }

    /// Archived URL of `original` inside this snapshot.
    pub fn archived_url(&self, original: &str) -> String {
        format!("{}/{original}", self.prefix())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            origin: Url::parse(DEFAULT_ARCHIVE_ORIGIN).expect("default archive origin is valid"),
            timestamp: DEFAULT_TIMESTAMP.to_string(),
        }
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.prefix())
    }
}

// ---------------------------------------------------------------------------
// CrawlId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for crawl run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrawlId(pub Uuid);

impl CrawlId {
    /// Generate a new time-sortable crawl identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CrawlId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CrawlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CrawlId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// MirrorManifest
// ---------------------------------------------------------------------------

/// The `mirror-manifest.json` written at the root of a mirror directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Identifier of the crawl run that produced the mirror.
    pub id: CrawlId,
    /// Snapshot URL the crawl started from.
    pub snapshot_url: String,
    /// Capture timestamp of the snapshot.
    pub timestamp: String,
    /// Tool version that produced the mirror.
    pub tool_version: String,
    /// When the crawl finished.
    pub created_at: DateTime<Utc>,
    /// Every file written during the crawl, in fetch order.
    pub files: Vec<MirroredFile>,
}

/// A single archived resource saved to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirroredFile {
    /// URL fetched from the archive.
    pub archived_url: String,
    /// URL of the resource on the live site, when it could be recovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    /// Path relative to the mirror root, `/`-separated.
    pub path: String,
    /// `Content-Type` reported by the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// SHA-256 of the bytes written.
    pub content_hash: String,
    /// Number of bytes written.
    pub bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_prefix() {
        let snapshot = Snapshot::default();
        assert_eq!(
            snapshot.prefix(),
            "https://web.archive.org/web/20250408214013"
        );
        assert_eq!(snapshot.authority(), "web.archive.org");
        assert_eq!(
            snapshot.archived_url("https://jamstash.io/"),
            "https://web.archive.org/web/20250408214013/https://jamstash.io/"
        );
    }

    #[test]
    fn snapshot_keeps_non_default_port() {
        let snapshot = Snapshot::new("http://127.0.0.1:8080/", "20240101000000").unwrap();
        assert_eq!(snapshot.origin(), "http://127.0.0.1:8080");
        assert_eq!(snapshot.authority(), "127.0.0.1:8080");
        assert_eq!(snapshot.prefix(), "http://127.0.0.1:8080/web/20240101000000");
    }

    #[test]
    fn snapshot_rejects_bad_timestamp() {
        assert!(Snapshot::new(DEFAULT_ARCHIVE_ORIGIN, "2025").is_err());
        assert!(Snapshot::new(DEFAULT_ARCHIVE_ORIGIN, "2025040821401x").is_err());
    }

    #[test]
    fn snapshot_rejects_non_http_origin() {
        let err = Snapshot::new("ftp://web.archive.org", DEFAULT_TIMESTAMP).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn crawl_id_roundtrip() {
        let id = CrawlId::new();
        let parsed: CrawlId = id.to_string().parse().expect("parse CrawlId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn manifest_serialization() {
        let manifest = MirrorManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: CrawlId::new(),
            snapshot_url: Snapshot::default().archived_url("https://jamstash.io/"),
            timestamp: DEFAULT_TIMESTAMP.into(),
            tool_version: "0.1.0".into(),
            created_at: Utc::now(),
            files: vec![MirroredFile {
                archived_url: Snapshot::default().archived_url("https://jamstash.io/"),
                original_url: Some("https://jamstash.io/".into()),
                path: "jamstash.io/index.html".into(),
                content_type: Some("text/html; charset=utf-8".into()),
                content_hash: "00".repeat(32),
                bytes: 42,
            }],
        };

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        let parsed: MirrorManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, "jamstash.io/index.html");
    }

    #[test]
    fn mirrored_file_omits_missing_fields() {
        let file = MirroredFile {
            archived_url: "https://web.archive.org/web/20250408214013/x".into(),
            original_url: None,
            path: "x".into(),
            content_type: None,
            content_hash: String::new(),
            bytes: 0,
        };
        let json = serde_json::to_string(&file).expect("serialize");
        assert!(!json.contains("original_url"));
        assert!(!json.contains("content_type"));
    }
}
