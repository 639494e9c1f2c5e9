use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Capture XML format error: {0}")]
    FormatError(String),

    #[error("XML parsing failed: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Stream encoding failed: {0}")]
    EncodingError(String),

    #[error("Container serialization failed: {0}")]
    ContainerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Invalid library profile: {0}")]
    ConfigError(String),

    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
