use thiserror::Error;

/// Main error type for the clipcrop pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    #[error("Asset fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Video tool error: {0}")]
    Video(#[from] VideoError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset {asset} already has a pipeline in flight")]
    AlreadyInFlight { asset: String },

    #[error("Pipeline coordinator is no longer running")]
    CoordinatorStopped,
}

/// Errors raised while building a composition plan
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("Asset {asset} has no video track")]
    NoVideoTrack { asset: String },

    #[error("Could not insert {kind} track: {reason}")]
    TrackInsertFailed { kind: String, reason: String },

    #[error("Track access failed: {reason}")]
    TrackAccess { reason: String },

    #[error("Invalid crop rectangle: {details}")]
    InvalidCrop { details: String },
}

/// Export stage errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export failed: {reason}")]
    Failed { reason: String },

    #[error("Export completed without an output file")]
    MissingOutput,

    #[error("Export finished with unhandled status: {status}")]
    UnexpectedStatus { status: String },

    #[error("Asset {asset} already has an active export")]
    AlreadyExporting { asset: String },
}

/// Compression stage errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Compression failed: {reason}")]
    Failed { reason: String },

    #[error("Compressor reported success but {path} does not exist")]
    OutputMissing { path: String },
}

/// Media store errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Asset unavailable: {asset}")]
    AssetUnavailable { asset: String },

    #[error("Could not probe {path}: {reason}")]
    ProbeFailed { path: String, reason: String },
}

/// Errors from external video tools (ffmpeg, ffprobe)
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("{tool} could not be launched: {reason}")]
    ToolNotFound { tool: String, reason: String },

    #[error("{tool} failed: {reason}")]
    ProcessFailed { tool: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Check if this error is recoverable (the request can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            // The asset may finish downloading later
            Self::Fetch(FetchError::AssetUnavailable { .. }) => true,
            // Retry once the running pipeline finishes
            Self::AlreadyInFlight { .. } => true,
            Self::Export(ExportError::AlreadyExporting { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Composition(CompositionError::NoVideoTrack { asset }) => {
                format!("'{}' does not contain a playable video track.", asset)
            }
            Self::Fetch(FetchError::AssetUnavailable { asset }) => {
                format!("'{}' could not be loaded from the library.", asset)
            }
            Self::Video(VideoError::ToolNotFound { tool, .. }) => {
                format!("'{}' was not found. Please install FFmpeg.", tool)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
