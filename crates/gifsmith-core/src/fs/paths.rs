//! Path validation for paths handed to the external tools.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Validates a local input media path.
///
/// - Rejects empty paths
/// - Rejects URLs (`http://`, `rtmp://`, ...), which ffmpeg would happily open
/// - Verifies the file exists and is a regular file
pub fn validate_input_path(path: &Path) -> CoreResult<PathBuf> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("input path is empty".to_string()));
    }

    if trimmed.contains("://") {
        return Err(CoreError::Validation(format!(
            "input must be a local file path, not a URL: {}",
            trimmed
        )));
    }

    let meta = std::fs::metadata(path).map_err(|_| CoreError::FileNotFound(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(CoreError::Validation(format!(
            "input is not a file: {}",
            path.display()
        )));
    }

    Ok(path.to_path_buf())
}

/// Validates an export destination and creates its parent directory.
pub fn validate_output_path(path: &Path) -> CoreResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(CoreError::Validation("destination path is empty".to_string()));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Don't allow overwriting a directory
    if path.is_dir() {
        return Err(CoreError::Validation(format!(
            "destination points to a directory: {}",
            path.display()
        )));
    }

    Ok(path.to_path_buf())
}

/// Render a path as a standalone tool argument.
///
/// A relative path starting with `-` would be parsed as an option, and one
/// whose first component contains `:` as a protocol (`pipe:1`,
/// `concat:a|b`). Both get a `./` prefix.
pub fn tool_path_arg(path: &Path) -> OsString {
    let needs_prefix = matches!(
        path.components().next(),
        Some(Component::Normal(first)) if {
            let first = first.to_string_lossy();
            first.starts_with('-') || first.contains(':')
        }
    );

    if needs_prefix {
        Path::new(".").join(path).into_os_string()
    } else {
        path.as_os_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_input_path_empty() {
        let err = validate_input_path(Path::new("  ")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_validate_input_path_rejects_urls() {
        for url in ["http://example.com/a.mp4", "rtmp://host/live", "HTTPS://x/y.mov"] {
            let err = validate_input_path(Path::new(url)).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{url}");
        }
    }

    #[test]
    fn test_validate_input_path_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = validate_input_path(&dir.path().join("missing.mp4")).unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
    }

    #[test]
    fn test_validate_input_path_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let err = validate_input_path(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_validate_input_path_valid_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("clip with spaces.mp4");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(validate_input_path(&file).unwrap(), file);
    }

    #[test]
    fn test_validate_output_path_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested").join("out.gif");
        validate_output_path(&dest).unwrap();
        assert!(dest.parent().unwrap().is_dir());
    }

    #[test]
    fn test_validate_output_path_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = validate_output_path(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_tool_path_arg_guards_leading_dash() {
        assert_eq!(
            tool_path_arg(Path::new("-y.gif")),
            Path::new(".").join("-y.gif").into_os_string()
        );
        assert_eq!(tool_path_arg(Path::new("out.gif")), OsString::from("out.gif"));
        assert_eq!(
            tool_path_arg(Path::new("/tmp/-odd.gif")),
            OsString::from("/tmp/-odd.gif")
        );
    }

    #[test]
    fn test_tool_path_arg_guards_protocol_prefixes() {
        for name in ["pipe:1", "concat:a.mp4|b.mp4", "file:x.gif", "clip:1.gif"] {
            assert_eq!(
                tool_path_arg(Path::new(name)),
                Path::new(".").join(name).into_os_string(),
                "{name}"
            );
        }
        // Only the first component can be read as a protocol.
        assert_eq!(
            tool_path_arg(Path::new("/tmp/pipe:1.gif")),
            OsString::from("/tmp/pipe:1.gif")
        );
        assert_eq!(
            tool_path_arg(Path::new("out/a:b.gif")),
            OsString::from("out/a:b.gif")
        );
    }
}
