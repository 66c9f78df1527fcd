//! Snapshot-bounded BFS crawler that mirrors archived pages to disk.
//!
//! The crawler starts from an archived URL, follows every link that stays
//! inside the same snapshot timestamp, and writes each resource under
//! `<out_dir>/<host>/<path>`. HTML is rewritten so the mirror browses offline.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use warpcrawler_shared::{
    CURRENT_SCHEMA_VERSION, CrawlConfig, CrawlId, MirrorManifest, MirroredFile, Result, Snapshot,
    WarpError,
};

use crate::links::find_links_to_follow;
use crate::paths::{entry_hint, guess_local_path, mirror_relative};
use crate::rewrite::{build_replacements, rewrite_html};
use crate::wayback::{WaybackResolver, split_fragment};

/// File name of the manifest written at the mirror root.
pub const MANIFEST_FILE_NAME: &str = "mirror-manifest.json";

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 10;

// ---------------------------------------------------------------------------
// Progress + summary
// ---------------------------------------------------------------------------

/// Summary of a completed crawl.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Number of files written.
    pub pages_saved: usize,
    /// Number of URLs fetched but not saved (non-200, transport error, write error).
    pub pages_skipped: usize,
    /// Failures encountered (URL, reason). None of them abort the crawl.
    pub errors: Vec<(String, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
    /// File to open once the mirror is complete.
    pub entry_hint: PathBuf,
    /// Manifest location, when one was written.
    pub manifest_path: Option<PathBuf>,
}

/// Progress callback for reporting crawl status.
pub trait CrawlProgress: Send + Sync {
    /// Called after a file is written.
    fn page_saved(&self, url: &str, saved: usize, queued: usize);
    /// Called when a URL is dropped.
    fn page_skipped(&self, url: &str, reason: &str);
    /// Called once the crawl completes.
    fn done(&self, summary: &CrawlSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl CrawlProgress for SilentProgress {
    fn page_saved(&self, _url: &str, _saved: usize, _queued: usize) {}
    fn page_skipped(&self, _url: &str, _reason: &str) {}
    fn done(&self, _summary: &CrawlSummary) {}
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Body and content type of a 200 response.
#[derive(Debug)]
struct Fetched {
    body: Vec<u8>,
    content_type: Option<String>,
}

/// A file written for one archived URL.
struct SavedPage {
    file: MirroredFile,
    links: Vec<String>,
}

/// Wayback snapshot mirror crawler.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
    resolver: WaybackResolver,
}

impl Crawler {
    /// Create a crawler for `snapshot` with the given configuration.
    pub fn new(config: CrawlConfig, snapshot: Snapshot) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| WarpError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            resolver: WaybackResolver::new(snapshot)?,
        })
    }

    /// The resolver used to filter and map archived URLs.
    pub fn resolver(&self) -> &WaybackResolver {
        &self.resolver
    }

    /// Normalize `start` and check that it belongs to the snapshot.
    pub fn start_url(&self, start: &str) -> Result<String> {
        let normalized = self
            .resolver
            .normalize(start)
            .unwrap_or_else(|| start.to_string());
        let normalized = split_fragment(&normalized).0.to_string();

        if !self.resolver.in_snapshot(&normalized) {
            return Err(WarpError::Snapshot {
                url: start.to_string(),
                prefix: self.resolver.prefix().to_string(),
            });
        }
        Ok(normalized)
    }

    /// Mirror everything reachable from `start` into `out_dir`.
    ///
    /// An existing `out_dir` is reused; files are overwritten in place.
    /// Individual fetch and write failures are recorded in the summary and
    /// never abort the crawl.
    #[instrument(skip_all, fields(start = %start, out_dir = %out_dir.display()))]
    pub async fn crawl(
        &self,
        start: &str,
        out_dir: &Path,
        progress: &dyn CrawlProgress,
    ) -> Result<CrawlSummary> {
        let start_time = Instant::now();
        let start = self.start_url(start)?;

        if out_dir.exists() {
            debug!("output directory exists, reusing it");
        } else {
            std::fs::create_dir_all(out_dir).map_err(|e| WarpError::io(out_dir, e))?;
        }

        let concurrency = self.config.concurrency.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([start.clone()]);
        let mut files: Vec<MirroredFile> = Vec::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut pages_skipped: usize = 0;

        info!(
            snapshot = %self.resolver.prefix(),
            concurrency,
            delay_ms = self.config.delay_ms,
            "starting crawl"
        );

        'crawl: while !queue.is_empty() {
            if self.page_limit_reached(files.len()) {
                info!(
                    max_pages = files.len(),
                    remaining = queue.len(),
                    "page limit reached, stopping"
                );
                break;
            }

            // Take a batch of unvisited URLs (up to the concurrency limit)
            let mut batch: Vec<String> = Vec::with_capacity(concurrency);
            while batch.len() < concurrency {
                let Some(url) = queue.pop_front() else { break };
                if visited.insert(url.clone()) {
                    batch.push(url);
                }
            }

            let mut handles = Vec::with_capacity(batch.len());
            for url in batch {
                let client = self.client.clone();
                let sem = semaphore.clone();
                let delay = self.config.delay_ms;

                handles.push(tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await;
                    if delay > 0 {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    let result = fetch(&client, &url).await;
                    (url, result)
                }));
            }

            for handle in handles {
                let (url, result) = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        errors.push(("task".into(), e.to_string()));
                        pages_skipped += 1;
                        continue;
                    }
                };

                let fetched = match result {
                    Ok(Ok(fetched)) => fetched,
                    Ok(Err(status)) => {
                        debug!(%url, %status, "non-200 response, skipping");
                        let reason = format!("HTTP {status}");
                        progress.page_skipped(&url, &reason);
                        errors.push((url, reason));
                        pages_skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "fetch failed");
                        progress.page_skipped(&url, &e.to_string());
                        errors.push((url, e.to_string()));
                        pages_skipped += 1;
                        continue;
                    }
                };

                match self.save(&url, fetched, out_dir) {
                    Ok(saved) => {
                        for link in saved.links {
                            if !visited.contains(&link) {
                                queue.push_back(link);
                            }
                        }
                        files.push(saved.file);
                        progress.page_saved(&url, files.len(), queue.len());
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "failed to save page");
                        progress.page_skipped(&url, &e.to_string());
                        errors.push((url, e.to_string()));
                        pages_skipped += 1;
                    }
                }

                if self.page_limit_reached(files.len()) {
                    info!(
                        max_pages = files.len(),
                        remaining = queue.len(),
                        "page limit reached, stopping"
                    );
                    break 'crawl;
                }
            }
        }

        let manifest_path = if self.config.write_manifest {
            Some(write_manifest(out_dir, &start, self.resolver.snapshot(), files.clone())?)
        } else {
            None
        };

        let hint = self
            .resolver
            .original_url(&start)
            .and_then(|original| Url::parse(&original).ok())
            .map(|original| entry_hint(out_dir, &original))
            .unwrap_or_else(|| out_dir.join("index.html"));

        let summary = CrawlSummary {
            pages_saved: files.len(),
            pages_skipped,
            errors,
            duration: start_time.elapsed(),
            entry_hint: hint,
            manifest_path,
        };

        info!(
            pages_saved = summary.pages_saved,
            pages_skipped = summary.pages_skipped,
            errors = summary.errors.len(),
            duration_ms = summary.duration.as_millis(),
            "crawl completed"
        );
        progress.done(&summary);

        Ok(summary)
    }

    fn page_limit_reached(&self, saved: usize) -> bool {
        self.config.max_pages.is_some_and(|max| saved >= max)
    }

    /// Write one fetched resource, rewriting it first when it is HTML.
    fn save(&self, archived: &str, fetched: Fetched, out_dir: &Path) -> Result<SavedPage> {
        let original = self.resolver.original_url(archived);
        // Unmappable URLs are stored under the archive's own host
        let location = original.as_deref().unwrap_or(archived);
        let location = Url::parse(location)
            .map_err(|e| WarpError::validation(format!("unmappable URL {location}: {e}")))?;

        let content_type = fetched.content_type.as_deref();
        let local_path = guess_local_path(out_dir, &location, content_type);
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WarpError::io(parent, e))?;
        }

        let is_html = content_type.is_some_and(|ct| ct.contains("text/html"));
        let (bytes, links) = if is_html {
            let html = String::from_utf8_lossy(&fetched.body);
            let discovered = find_links_to_follow(&html, &self.resolver);
            let replacements =
                build_replacements(&discovered, &self.resolver, out_dir, &local_path);
            let rewritten = rewrite_html(&html, &replacements);
            debug!(
                url = %archived,
                links = discovered.len(),
                rewritten = replacements.len(),
                "parsed html"
            );
            (rewritten.into_bytes(), discovered.links.into_iter().collect())
        } else {
            (fetched.body, Vec::new())
        };

        std::fs::write(&local_path, &bytes).map_err(|e| WarpError::io(&local_path, e))?;
        debug!(url = %archived, path = %local_path.display(), bytes = bytes.len(), "saved");

        Ok(SavedPage {
            file: MirroredFile {
                archived_url: archived.to_string(),
                original_url: original,
                path: mirror_relative(out_dir, &local_path),
                content_type: fetched.content_type,
                content_hash: compute_hash(&bytes),
                bytes: bytes.len(),
            },
            links,
        })
    }
}

// ---------------------------------------------------------------------------
// Fetching + manifest
// ---------------------------------------------------------------------------

/// Fetch an archived URL. A non-200 status is returned as the inner `Err`.
async fn fetch(client: &Client, url: &str) -> Result<std::result::Result<Fetched, StatusCode>> {
    debug!(%url, "fetching");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| WarpError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Ok(Err(status));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response
        .bytes()
        .await
        .map_err(|e| WarpError::Network(format!("{url}: body read failed: {e}")))?;

    Ok(Ok(Fetched {
        body: body.to_vec(),
        content_type,
    }))
}

/// Write `mirror-manifest.json` at the mirror root.
fn write_manifest(
    out_dir: &Path,
    start: &str,
    snapshot: &Snapshot,
    files: Vec<MirroredFile>,
) -> Result<PathBuf> {
    let manifest = MirrorManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        id: CrawlId::new(),
        snapshot_url: start.to_string(),
        timestamp: snapshot.timestamp().to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        created_at: Utc::now(),
        files,
    };

    let path = out_dir.join(MANIFEST_FILE_NAME);
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| WarpError::validation(format!("manifest encoding: {e}")))?;
    std::fs::write(&path, json).map_err(|e| WarpError::io(&path, e))?;
    debug!(path = %path.display(), files = manifest.files.len(), "wrote manifest");

    Ok(path)
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod crawler_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TS: &str = "20250408214013";

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            delay_ms: 0,
            ..CrawlConfig::default()
        }
    }

    async fn mount_html(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8"),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash(b"hello world");
        assert_eq!(hash.len(), 64); // SHA-256 = 64 hex chars
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn start_url_outside_snapshot_is_rejected() {
        let crawler = Crawler::new(test_config(), Snapshot::default()).unwrap();

        let err = crawler
            .start_url("https://web.archive.org/web/20190101000000/https://jamstash.io/")
            .unwrap_err();
        assert!(matches!(err, WarpError::Snapshot { .. }));
        assert_eq!(err.exit_code(), 1);

        let ok = crawler
            .start_url("/web/20250408214013/https://jamstash.io/")
            .unwrap();
        assert_eq!(ok, "https://web.archive.org/web/20250408214013/https://jamstash.io/");
    }

    #[tokio::test]
    async fn test_mirror_with_mock_archive() {
        let server = MockServer::start().await;

        let index = format!(
            r#"<html><head>
                <link rel="stylesheet" href="/web/{TS}cs_/https://jamstash.io/site.css">
            </head><body>
                <a href="/web/{TS}/https://jamstash.io/about">About</a>
                <a href="/web/{TS}/https://jamstash.io/missing">Missing</a>
                <a href="/web/20190101000000/https://jamstash.io/old">Old capture</a>
                <img src="/web/{TS}im_/https://jamstash.io/logo.png">
            </body></html>"#
        );
        let about = format!(
            r#"<html><body><a href="/web/{TS}/https://jamstash.io/">Home</a></body></html>"#
        );

        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/"), &index).await;
        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/about"), &about).await;

        Mock::given(path(format!("/web/{TS}cs_/https://jamstash.io/site.css")))
            .respond_with(ResponseTemplate::new(200).set_body_raw("body{}", "text/css"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path(format!("/web/{TS}im_/https://jamstash.io/logo.png")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89u8, b'P', b'N', b'G'], "image/png"))
            .mount(&server)
            .await;
        Mock::given(path(format!("/web/{TS}/https://jamstash.io/missing")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/web/20190101000000/https://jamstash.io/old"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let snapshot = Snapshot::new(&server.uri(), TS).unwrap();
        let crawler = Crawler::new(test_config(), snapshot).unwrap();
        let out = tempfile::tempdir().unwrap();
        let root = out.path().join("mirror");

        let summary = crawler
            .crawl(&format!("/web/{TS}/https://jamstash.io/"), &root, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_saved, 4);
        assert_eq!(summary.pages_skipped, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].0.ends_with("/missing"));
        assert_eq!(summary.entry_hint, root.join("jamstash.io").join("index.html"));

        let site = root.join("jamstash.io");
        let index_html = std::fs::read_to_string(site.join("index.html")).unwrap();
        assert!(index_html.contains(r#"href="site.css""#));
        assert!(index_html.contains(r#"href="about.html""#));
        assert!(index_html.contains(r#"src="logo.png""#));
        // Links outside the snapshot are left as they were
        assert!(index_html.contains("/web/20190101000000/https://jamstash.io/old"));

        let about_html = std::fs::read_to_string(site.join("about.html")).unwrap();
        assert!(about_html.contains(r#"href="index.html""#));

        assert_eq!(std::fs::read(site.join("logo.png")).unwrap(), b"\x89PNG");
        assert_eq!(std::fs::read_to_string(site.join("site.css")).unwrap(), "body{}");

        let manifest: MirrorManifest = serde_json::from_str(
            &std::fs::read_to_string(root.join(MANIFEST_FILE_NAME)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.files.len(), 4);
        assert_eq!(manifest.timestamp, TS);
        assert!(manifest.files.iter().any(|f| f.path == "jamstash.io/about.html"));
    }

    #[tokio::test]
    async fn test_crawl_respects_max_pages() {
        let server = MockServer::start().await;

        let index = format!(
            r#"<a href="/web/{TS}/https://jamstash.io/a">A</a>
               <a href="/web/{TS}/https://jamstash.io/b">B</a>"#
        );
        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/"), &index).await;
        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/a"), "<p>a</p>").await;
        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/b"), "<p>b</p>").await;

        let config = CrawlConfig {
            max_pages: Some(2),
            write_manifest: false,
            ..test_config()
        };
        let crawler = Crawler::new(config, Snapshot::new(&server.uri(), TS).unwrap()).unwrap();
        let out = tempfile::tempdir().unwrap();

        let summary = crawler
            .crawl(&format!("/web/{TS}/https://jamstash.io/"), out.path(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_saved, 2);
        assert!(summary.manifest_path.is_none());
        assert!(!out.path().join(MANIFEST_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_zero_max_pages_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(path(format!("/web/{TS}/https://jamstash.io/")))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>home</p>", "text/html"))
            .expect(0)
            .mount(&server)
            .await;

        let config = CrawlConfig {
            max_pages: Some(0),
            ..test_config()
        };
        let crawler = Crawler::new(config, Snapshot::new(&server.uri(), TS).unwrap()).unwrap();
        let out = tempfile::tempdir().unwrap();

        let summary = crawler
            .crawl(&format!("/web/{TS}/https://jamstash.io/"), out.path(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_saved, 0);
        assert_eq!(summary.pages_skipped, 0);
        assert!(!out.path().join("jamstash.io").exists());
    }

    #[tokio::test]
    async fn test_transport_error_is_recorded_and_crawl_continues() {
        let server = MockServer::start().await;

        let index = format!(
            r#"<a href="/web/{TS}/https://jamstash.io/slow">Slow</a>
               <a href="/web/{TS}/https://jamstash.io/fast">Fast</a>"#
        );
        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/"), &index).await;
        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/fast"), "<p>fast</p>").await;
        Mock::given(path(format!("/web/{TS}/https://jamstash.io/slow")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>slow</p>", "text/html")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = CrawlConfig {
            timeout: Duration::from_millis(300),
            ..test_config()
        };
        let crawler = Crawler::new(config, Snapshot::new(&server.uri(), TS).unwrap()).unwrap();
        let out = tempfile::tempdir().unwrap();

        let summary = crawler
            .crawl(&format!("/web/{TS}/https://jamstash.io/"), out.path(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_saved, 2);
        assert_eq!(summary.pages_skipped, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].0.ends_with("/slow"));
        assert!(!summary.errors[0].1.starts_with("HTTP "));

        let site = out.path().join("jamstash.io");
        assert!(site.join("fast.html").exists());
        assert!(!site.join("slow.html").exists());
    }

    #[tokio::test]
    async fn test_concurrent_crawl_fetches_each_url_once() {
        let server = MockServer::start().await;

        let index = format!(
            r#"<a href="/web/{TS}/https://jamstash.io/a">A</a>
               <a href="//{host}/web/{TS}/https://jamstash.io/a">A again</a>
               <a href="/web/{TS}/https://jamstash.io/b">B</a>"#,
            host = server.address()
        );
        mount_html(&server, &format!("/web/{TS}/https://jamstash.io/"), &index).await;

        let leaf = format!(r#"<a href="/web/{TS}/https://jamstash.io/">Home</a>"#);
        for route in ["a", "b"] {
            Mock::given(path(format!("/web/{TS}/https://jamstash.io/{route}")))
                .respond_with(ResponseTemplate::new(200).set_body_raw(leaf.clone(), "text/html"))
                .expect(1)
                .mount(&server)
                .await;
        }

        let config = CrawlConfig {
            concurrency: 4,
            ..test_config()
        };
        let crawler = Crawler::new(config, Snapshot::new(&server.uri(), TS).unwrap()).unwrap();
        let out = tempfile::tempdir().unwrap();

        let summary = crawler
            .crawl(&format!("/web/{TS}/https://jamstash.io/"), out.path(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_saved, 3);
        assert!(summary.errors.is_empty());
    }
}
