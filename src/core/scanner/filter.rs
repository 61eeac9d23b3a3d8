//! Extension and size filtering for the walker.

use std::path::Path;

/// Decides which files are candidate images
#[derive(Debug, Clone)]
pub struct FileFilter {
    include_hidden: bool,
}

impl FileFilter {
    pub fn new(include_hidden: bool) -> Self {
        Self { include_hidden }
    }

    /// True when the extension names a supported format
    pub fn is_supported(&self, path: &Path) -> bool {
        self.format_of(path).is_some()
    }

    /// Canonical format name for a path, aliases collapsed
    /// (".jpg"/".jpeg" -> "jpeg", ".tif"/".tiff" -> "tiff")
    pub fn format_of(&self, path: &Path) -> Option<&'static str> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" => Some("jpeg"),
            "png" => Some("png"),
            "webp" => Some("webp"),
            "tiff" | "tif" => Some("tiff"),
            "bmp" => Some("bmp"),
            "gif" => Some("gif"),
            _ => None,
        }
    }

    /// Hidden files are skipped unless configured otherwise
    pub fn is_hidden(&self, path: &Path) -> bool {
        if self.include_hidden {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
    }

    pub fn should_include(&self, path: &Path) -> bool {
        self.is_supported(path) && !self.is_hidden(path)
    }
}
