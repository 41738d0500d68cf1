use thiserror::Error;

/// Errors from the firmware metadata service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}) for {url}")]
    Api { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// The identifier/buildid pair is not in the release catalog.
    #[error("Build {buildid} not found for {identifier}")]
    BuildNotFound { identifier: String, buildid: String },

    #[error("Unknown device identifier: {0}")]
    UnknownDevice(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
