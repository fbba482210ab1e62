#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid YAML in scheme.")]
    Scheme(#[from] serde_yaml::Error),
    #[error("Invalid scheme: {0}")]
    InvalidScheme(String),
    #[error("Invalid YAML in map configuration.")]
    Configuration(#[source] serde_yaml::Error),
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),
    #[error("Invalid zoom level: {0}")]
    InvalidZoom(String),
}

pub type Result<T> = std::result::Result<T, Error>;
