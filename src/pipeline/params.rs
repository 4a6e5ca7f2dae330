use std::path::{Component, Path, PathBuf};

use crate::error::{DeployError, Result};
use crate::s3::Headers;
use crate::s3::helpers::detect_content_type;

pub const ACL_HEADER: &str = "x-amz-acl";
pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const CACHE_CONTROL_HEADER: &str = "cache-control";

pub const PUBLIC_READ: &str = "public-read";

/// Ten years. Versioned assets never change once published.
pub const VERSIONED_CACHE_CONTROL: &str = "max-age=315360000, no-transform, public";

/// Five minutes, for files that are overwritten by every release.
pub const UNVERSIONED_CACHE_CONTROL: &str = "max-age=300, s-maxage=300, no-transform, public";

/// Where one local file goes and with which headers. Shared by every target bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParameter {
    pub local_path: PathBuf,
    pub object_key: String,
    pub headers: Headers,
    pub is_versioned: bool,
}

impl UploadParameter {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE_HEADER)
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.header(CACHE_CONTROL_HEADER)
    }

    pub fn acl(&self) -> Option<&str> {
        self.header(ACL_HEADER)
    }
}

/// True iff one of the directories on `path` is named exactly `version`.
///
/// Purely lexical: `/foo/216/bar.js` is versioned for `216`,
/// `/foo/2160/bar.js` is not.
pub fn is_versioned(path: &Path, version: &str) -> bool {
    if version.is_empty() {
        return false;
    }

    path.parent().is_some_and(|dir| {
        dir.components()
            .any(|c| matches!(c, Component::Normal(segment) if segment == version))
    })
}

/// Headers every uploaded object carries: public read, content type and
/// exactly one of the two cache directives.
pub fn object_headers(path: &Path, versioned: bool) -> Headers {
    let cache_control = if versioned {
        VERSIONED_CACHE_CONTROL
    } else {
        UNVERSIONED_CACHE_CONTROL
    };

    Headers::from([
        (ACL_HEADER.to_string(), PUBLIC_READ.to_string()),
        (
            CONTENT_TYPE_HEADER.to_string(),
            detect_content_type(path).to_string(),
        ),
        (CACHE_CONTROL_HEADER.to_string(), cache_control.to_string()),
    ])
}

/// Construct the object key for `relative_path`, joining `prefix` in front
///
/// # Returns
///
/// A `/`-separated key with no doubled, leading or trailing slashes
pub fn build_object_key(prefix: Option<&str>, relative_path: &Path) -> String {
    let path = relative_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, path),
        None => path,
    }
}

/// Map one file found under `local_dir` to its upload parameters
///
/// # Arguments
///
/// * `local_dir` - Root of the build output being deployed
/// * `file` - A file under `local_dir`, as yielded by the directory walk
/// * `prefix` - Optional key prefix, e.g. `omd`
/// * `version` - Active release version, if any
pub fn build_upload_parameter(
    local_dir: &Path,
    file: &Path,
    prefix: Option<&str>,
    version: Option<&str>,
) -> Result<UploadParameter> {
    let relative = file
        .strip_prefix(local_dir)
        .map_err(|_| DeployError::InvalidConfig(format!(
            "{} is not inside {}",
            file.display(),
            local_dir.display()
        )))?;

    let local_path = local_dir.join(relative);
    let versioned = version.is_some_and(|v| is_versioned(&local_path, v));

    Ok(UploadParameter {
        object_key: build_object_key(prefix, relative),
        headers: object_headers(&local_path, versioned),
        is_versioned: versioned,
        local_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_versioned_exact_segment() {
        assert!(is_versioned(Path::new("/foo/216/bar.js"), "216"));
        assert!(is_versioned(Path::new("build/216/one/two.js"), "216"));
        assert!(!is_versioned(Path::new("/foo/bar.js"), "216"));
        assert!(!is_versioned(Path::new("/foo/2160/bar.js"), "216"));
        assert!(!is_versioned(Path::new("/foo/v216/bar.js"), "216"));
    }

    #[test]
    fn test_is_versioned_ignores_file_name_and_empty_version() {
        assert!(!is_versioned(Path::new("/foo/216"), "216"));
        assert!(!is_versioned(Path::new("/foo/216/bar.js"), ""));
    }

    #[test]
    fn test_local_dir_segments_count_for_versioning() {
        let param = build_upload_parameter(
            Path::new("releases/216"),
            Path::new("releases/216/app.js"),
            None,
            Some("216"),
        )
        .unwrap();
        assert!(param.is_versioned);
        assert_eq!(param.object_key, "app.js");
    }

    #[test]
    fn test_object_key_is_relative_to_local_dir() {
        let param =
            build_upload_parameter(Path::new("build"), Path::new("build/one/two.js"), None, None)
                .unwrap();
        assert_eq!(param.local_path, PathBuf::from("build/one/two.js"));
        assert_eq!(param.object_key, "one/two.js");
    }

    #[test]
    fn test_prefix_is_joined_once() {
        let file = Path::new("build/one/two.js");
        for prefix in ["foo", "foo/", "/foo/"] {
            let param =
                build_upload_parameter(Path::new("build"), file, Some(prefix), None).unwrap();
            assert_eq!(param.object_key, "foo/one/two.js");
        }

        let param = build_upload_parameter(Path::new("build"), file, Some(""), None).unwrap();
        assert_eq!(param.object_key, "one/two.js");
    }

    #[test]
    fn test_always_public_read() {
        let param =
            build_upload_parameter(Path::new("build"), Path::new("build/a.css"), None, None)
                .unwrap();
        assert_eq!(param.acl(), Some(PUBLIC_READ));
    }

    #[test]
    fn test_versioned_assets_are_cached_for_a_long_time() {
        let param = build_upload_parameter(
            Path::new("build"),
            Path::new("build/216/one/two.js"),
            None,
            Some("216"),
        )
        .unwrap();
        assert!(param.is_versioned);
        assert!(param.cache_control().unwrap().contains("max-age=315360000"));
    }

    #[test]
    fn test_unversioned_assets_are_cached_for_a_short_time() {
        let param = build_upload_parameter(
            Path::new("build"),
            Path::new("build/one/two.js"),
            None,
            Some("216"),
        )
        .unwrap();
        assert!(!param.is_versioned);
        assert!(param.cache_control().unwrap().contains("max-age=300"));
    }

    #[test]
    fn test_content_type_header() {
        let js = build_upload_parameter(Path::new("build"), Path::new("build/one/two.js"), None, None)
            .unwrap();
        assert_eq!(js.content_type(), Some("application/javascript"));

        let other =
            build_upload_parameter(Path::new("build"), Path::new("build/one/two.aaa"), None, None)
                .unwrap();
        assert_eq!(other.content_type(), Some("application/octet-stream"));
    }

    #[test]
    fn test_file_outside_local_dir_is_rejected() {
        let err = build_upload_parameter(Path::new("build"), Path::new("dist/a.js"), None, None)
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
