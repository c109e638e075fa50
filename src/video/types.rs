use serde::{Deserialize, Serialize};
use std::fmt;

/// Container used for every file the pipeline writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFileType {
    #[default]
    Mp4,
    Mov,
    M4v,
}

impl VideoFileType {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFileType::Mp4 => "mp4",
            VideoFileType::Mov => "mov",
            VideoFileType::M4v => "m4v",
        }
    }

    /// Parse from a file extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp4" => Some(VideoFileType::Mp4),
            "mov" => Some(VideoFileType::Mov),
            "m4v" => Some(VideoFileType::M4v),
            _ => None,
        }
    }
}

impl fmt::Display for VideoFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
