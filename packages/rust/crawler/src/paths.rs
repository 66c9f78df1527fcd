//! Local file layout of a mirror: `<root>/<host>/<url path>`.

use std::path::{Component, Path, PathBuf};

use url::Url;

/// Directory name for a URL's host. A non-default port is appended as
/// `_<port>` so the name stays valid on every filesystem.
fn host_dir(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}_{port}"),
        None => host.to_string(),
    }
}

/// Whether the last path segment carries a file extension.
/// Leading dots (`.htaccess`) do not count.
fn has_extension(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or_default();
    name.trim_start_matches('.').contains('.')
}

/// Where the resource at `original` is stored under `root`.
///
/// Directory URLs map to `index.html`. An extension-less path served as
/// `text/html` gets `.html` appended. Query and fragment are ignored.
pub fn guess_local_path(root: &Path, original: &Url, content_type: Option<&str>) -> PathBuf {
    let mut path = original.path().to_string();
    if path.is_empty() || path.ends_with('/') {
        if path.is_empty() {
            path.push('/');
        }
        path.push_str("index.html");
    }

    if !has_extension(&path) && content_type.is_some_and(|ct| ct.contains("text/html")) {
        path.push_str(".html");
    }

    let mut local = root.join(host_dir(original));
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        local.push(segment);
    }
    local
}

/// The file a browser should open once the mirror of `start` is complete.
pub fn entry_hint(root: &Path, start: &Url) -> PathBuf {
    root.join(host_dir(start)).join("index.html")
}

/// Relative, `/`-separated path from directory `from_dir` to `target`.
///
/// Both paths must be rooted the same way (both relative to the same base
/// or both absolute).
pub fn relative_path(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component<'_>> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat_n("..".to_string(), from.len() - common));
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// `path` relative to the mirror root, `/`-separated, for the manifest.
pub fn mirror_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn directory_urls_map_to_index() {
        let root = Path::new("site");
        assert_eq!(
            guess_local_path(root, &url("https://jamstash.io/"), None),
            Path::new("site/jamstash.io/index.html")
        );
        assert_eq!(
            guess_local_path(root, &url("https://jamstash.io/docs/"), Some("text/html")),
            Path::new("site/jamstash.io/docs/index.html")
        );
    }

    #[test]
    fn html_without_extension_gets_suffix() {
        let root = Path::new("site");
        assert_eq!(
            guess_local_path(
                root,
                &url("https://jamstash.io/about?ref=nav"),
                Some("text/html; charset=utf-8")
            ),
            Path::new("site/jamstash.io/about.html")
        );
        assert_eq!(
            guess_local_path(root, &url("https://jamstash.io/about"), None),
            Path::new("site/jamstash.io/about")
        );
        assert_eq!(
            guess_local_path(root, &url("https://jamstash.io/app.js"), Some("text/html")),
            Path::new("site/jamstash.io/app.js")
        );
    }

    #[test]
    fn dotfiles_have_no_extension() {
        assert!(!has_extension("/.well-known/.htaccess"));
        assert!(has_extension("/assets/logo.v2.png"));
        assert!(!has_extension("/v1.2/docs"));
    }

    #[test]
    fn port_becomes_part_of_host_dir() {
        assert_eq!(
            guess_local_path(Path::new("out"), &url("http://localhost:8080/a.css"), None),
            Path::new("out/localhost_8080/a.css")
        );
    }

    #[test]
    fn entry_hint_points_at_host_index() {
        assert_eq!(
            entry_hint(Path::new("jamstash_site"), &url("https://jamstash.io/")),
            Path::new("jamstash_site/jamstash.io/index.html")
        );
    }

    #[test]
    fn relative_path_between_files() {
        let from = Path::new("site/jamstash.io/docs");
        assert_eq!(
            relative_path(from, Path::new("site/jamstash.io/assets/logo.png")),
            "../assets/logo.png"
        );
        assert_eq!(
            relative_path(from, Path::new("site/jamstash.io/docs/intro")),
            "intro"
        );
        assert_eq!(
            relative_path(Path::new("site/jamstash.io"), Path::new("site/cdn.example.com/x.js")),
            "../cdn.example.com/x.js"
        );
    }

    #[test]
    fn mirror_relative_uses_forward_slashes() {
        let root = Path::new("site");
        let file = root.join("jamstash.io").join("index.html");
        assert_eq!(mirror_relative(root, &file), "jamstash.io/index.html");
    }
}
