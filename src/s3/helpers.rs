use std::path::Path;

use crate::config::RedirectMap;
use crate::error::{DeployError, Result};

/// Content type used when the extension is not recognized
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Detect Content-Type based on file extension
///
/// Covers the formats a static front-end build produces. Falls back to
/// "application/octet-stream" for unknown types.
pub fn detect_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        // Markup and scripts
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "application/javascript",
        Some("map") | Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("md") => "text/markdown",
        Some("webmanifest") => "application/manifest+json",
        Some("wasm") => "application/wasm",

        // Image formats
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",

        // Media
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",

        // Documents and archives
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",

        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Parse redirect pairs given on the command line
///
/// Expected format: "from1=to1,from2=to2". Unlike metadata parsing this is
/// strict: a malformed pair is an error, never silently dropped.
///
/// # Examples
///
/// ```
/// use asset_deployer::s3::helpers::parse_redirects;
///
/// let redirects = parse_redirects(&["app=omd/index.html".to_string()]).unwrap();
/// assert_eq!(redirects.get("app"), Some(&"omd/index.html".to_string()));
/// ```
pub fn parse_redirects(pairs: &[String]) -> Result<RedirectMap> {
    let mut redirects = RedirectMap::new();

    for pair in pairs.iter().flat_map(|p| p.split(',')) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let (from, to) = pair
            .split_once('=')
            .ok_or_else(|| DeployError::InvalidRedirect {
                entry: pair.to_string(),
                reason: "expected from=to".to_string(),
            })?;
        let (from, to) = (from.trim(), to.trim());

        if from.is_empty() || to.is_empty() {
            return Err(DeployError::InvalidRedirect {
                entry: pair.to_string(),
                reason: "both sides of '=' are required".to_string(),
            });
        }

        if redirects.insert(from.to_string(), to.to_string()).is_some() {
            return Err(DeployError::InvalidRedirect {
                entry: pair.to_string(),
                reason: format!("'{}' is redirected more than once", from),
            });
        }
    }

    Ok(redirects)
}

/// Parse a JSON object of `{"from": "to"}` redirects
pub fn parse_redirects_json(json: &str) -> Result<RedirectMap> {
    serde_json::from_str(json).map_err(|e| DeployError::InvalidRedirect {
        entry: "<redirects file>".to_string(),
        reason: e.to_string(),
    })
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_content_type_web_assets() {
        assert_eq!(
            detect_content_type(&PathBuf::from("build/one/two.js")),
            "application/javascript"
        );
        assert_eq!(detect_content_type(&PathBuf::from("index.html")), "text/html");
        assert_eq!(detect_content_type(&PathBuf::from("app.CSS")), "text/css");
        assert_eq!(
            detect_content_type(&PathBuf::from("fonts/icons.woff2")),
            "font/woff2"
        );
    }

    #[test]
    fn test_detect_content_type_unknown() {
        assert_eq!(
            detect_content_type(&PathBuf::from("build/one/two.aaa")),
            "application/octet-stream"
        );
        assert_eq!(
            detect_content_type(&PathBuf::from("no_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_parse_redirects() {
        let redirects = parse_redirects(&[
            "app=omd/index.html,login=omd/login.html".to_string(),
            "help=docs/index.html".to_string(),
        ])
        .unwrap();

        assert_eq!(redirects.len(), 3);
        assert_eq!(redirects.get("app"), Some(&"omd/index.html".to_string()));
        assert_eq!(redirects.get("login"), Some(&"omd/login.html".to_string()));
        assert_eq!(redirects.get("help"), Some(&"docs/index.html".to_string()));
    }

    #[test]
    fn test_parse_redirects_empty() {
        assert!(parse_redirects(&[]).unwrap().is_empty());
        assert!(parse_redirects(&[String::new()]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_redirects_malformed() {
        assert!(parse_redirects(&["app".to_string()]).is_err());
        assert!(parse_redirects(&["app=".to_string()]).is_err());
        assert!(parse_redirects(&["=omd/index.html".to_string()]).is_err());
        assert!(parse_redirects(&["app=a,app=b".to_string()]).is_err());
    }

    #[test]
    fn test_parse_redirects_json() {
        let redirects = parse_redirects_json(r#"{"app": "omd/index.html"}"#).unwrap();
        assert_eq!(redirects.get("app"), Some(&"omd/index.html".to_string()));

        assert!(parse_redirects_json(r#"["app"]"#).is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
