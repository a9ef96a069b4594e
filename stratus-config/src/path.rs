//! Storage path normalization
//!
//! A storage location is written as a single `bucket[/folder...]` string.
//! Trigger registration needs the bucket and folder apart, while other
//! consumers need the path exactly as the user wrote it, so both are kept.

use serde::{Deserialize, Serialize};

/// A storage location split into its bucket and folder
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoragePath {
    /// First path segment
    pub bucket: String,
    /// Remaining non-empty segments joined with `/`, empty if none
    pub folder: String,
    /// The location exactly as given
    pub full: String,
}

impl StoragePath {
    /// Folder, treating an empty one as absent
    pub fn folder_opt(&self) -> Option<&str> {
        if self.folder.is_empty() {
            None
        } else {
            Some(&self.folder)
        }
    }

    /// Rebuild `bucket[/folder]`
    pub fn join(&self) -> String {
        match self.folder_opt() {
            Some(folder) => format!("{}/{}", self.bucket, folder),
            None => self.bucket.clone(),
        }
    }

    /// Key prefix objects must carry to fall under this location
    pub fn key_prefix(&self) -> String {
        self.folder_opt()
            .map(|folder| format!("{folder}/"))
            .unwrap_or_default()
    }
}

/// Split a combined storage location into bucket and folder.
///
/// An empty input yields an empty bucket; rejecting it is the caller's call.
pub fn normalize(path: &str) -> StoragePath {
    let mut segments = path.split('/');
    let bucket = segments.next().unwrap_or_default().to_string();
    let folder = segments
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    StoragePath {
        bucket,
        folder,
        full: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_only() {
        let path = normalize("test1");
        assert_eq!(path.bucket, "test1");
        assert_eq!(path.folder, "");
        assert_eq!(path.full, "test1");
        assert_eq!(path.folder_opt(), None);
    }

    #[test]
    fn test_nested_folder() {
        let path = normalize("test1/in/deep");
        assert_eq!(path.bucket, "test1");
        assert_eq!(path.folder, "in/deep");
        assert_eq!(path.full, "test1/in/deep");
        assert_eq!(path.key_prefix(), "in/deep/");
    }

    #[test]
    fn test_trailing_slash_is_dropped() {
        let path = normalize("test1/in/");
        assert_eq!(path.folder, "in");
        assert_eq!(path.full, "test1/in/");

        let path = normalize("test1/");
        assert_eq!(path.bucket, "test1");
        assert_eq!(path.folder_opt(), None);
    }

    #[test]
    fn test_empty_input() {
        let path = normalize("");
        assert_eq!(path.bucket, "");
        assert_eq!(path.folder, "");
        assert_eq!(path.full, "");
    }

    #[test]
    fn test_join_reconstructs_input() {
        for input in ["b", "b/", "b/f", "b/f/", "b/f/g", "b/f/g/", "data-in/2024/01"] {
            let path = normalize(input);
            assert_eq!(path.join(), input.trim_end_matches('/'), "input {input}");
        }
    }
}
