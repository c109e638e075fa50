use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    export::PollSettings,
    pipeline::SilentOutcomes,
    scratch::ScratchDir,
    video::VideoFileType,
};

/// Main configuration for the export pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output file type and scratch location
    pub video: VideoConfig,

    /// Export session settings
    pub export: ExportConfig,

    /// Compression stage settings
    pub compression: CompressionConfig,

    /// Progress reporting
    pub progress: ProgressConfig,

    /// Caller-facing behaviour
    pub pipeline: PipelineConfig,

    /// External tool locations
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.export.validate()?;
        self.progress.validate()?;
        self.tools.validate()?;
        Ok(())
    }
}

/// Output file configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Container of every file the pipeline writes
    pub file_type: VideoFileType,

    /// Directory for temporary files, system temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl VideoConfig {
    pub fn scratch(&self) -> ScratchDir {
        match &self.scratch_dir {
            Some(dir) => ScratchDir::new(dir),
            None => ScratchDir::system(),
        }
    }
}

/// Export session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Progress polling interval (milliseconds)
    pub poll_interval_ms: u64,

    /// Polling stops once progress exceeds this
    pub progress_stop_threshold: f64,

    /// Encoder used by the ffmpeg exporter
    pub video_codec: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            progress_stop_threshold: 0.99,
            video_codec: "libx264".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            stop_threshold: self.progress_stop_threshold,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "export.poll_interval_ms".to_string(),
                value: self.poll_interval_ms.to_string()
            }.into());
        }

        if !(0.0..=1.0).contains(&self.progress_stop_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "export.progress_stop_threshold".to_string(),
                value: self.progress_stop_threshold.to_string()
            }.into());
        }

        if self.video_codec.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "export.video_codec".to_string(),
                value: self.video_codec.clone()
            }.into());
        }

        Ok(())
    }
}

/// Compression stage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Keep the exported file once it has been compressed
    pub keep_intermediate: bool,
}

/// Progress reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Label passed to the progress sink with every update
    pub label: String,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            label: "Processing videos".to_string(),
        }
    }
}

impl ProgressConfig {
    fn validate(&self) -> Result<()> {
        if self.label.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "progress.label".to_string(),
                value: String::new()
            }.into());
        }
        Ok(())
    }
}

/// Caller-facing pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whether cancelled and unavailable requests get a reply
    pub silent_outcomes: SilentOutcomes,
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl ToolsConfig {
    fn validate(&self) -> Result<()> {
        for (key, path) in [("tools.ffmpeg", &self.ffmpeg), ("tools.ffprobe", &self.ffprobe)] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: String::new()
                }.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.export.poll_settings().interval, Duration::from_millis(100));
        assert_eq!(config.video.file_type.extension(), "mp4");
        assert_eq!(config.pipeline.silent_outcomes, SilentOutcomes::Notify);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.video.scratch_dir = Some(dir.path().join("scratch"));
        original_config.pipeline.silent_outcomes = SilentOutcomes::Suppress;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config.video.scratch_dir, loaded_config.video.scratch_dir);
        assert_eq!(loaded_config.pipeline.silent_outcomes, SilentOutcomes::Suppress);
        assert_eq!(original_config.export.poll_interval_ms, loaded_config.export.poll_interval_ms);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[pipeline]\nsilent_outcomes = \"suppress\"\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.pipeline.silent_outcomes, SilentOutcomes::Suppress);
        assert_eq!(config.export.progress_stop_threshold, 0.99);
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_invalid_poll_interval() {
        let mut config = Config::default();
        config.export.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_stop_threshold() {
        let mut config = Config::default();
        config.export.progress_stop_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_file("/nonexistent/clipcrop.toml").is_err());
    }
}
