//! Error types for edv

use std::path::PathBuf;

pub type EdvResult<T> = Result<T, EdvError>;

#[derive(thiserror::Error, Debug)]
pub enum EdvError {
    /// Degenerate quadrilateral or singular linear system
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Malformed template or invalid parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EdvError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::ResourceNotFound(path.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert!(EdvError::geometry("x")
            .to_string()
            .starts_with("invalid geometry:"));
        assert!(EdvError::configuration("x")
            .to_string()
            .starts_with("configuration error:"));
        assert_eq!(
            EdvError::not_found("templates/foo/base.png").to_string(),
            "resource not found: templates/foo/base.png"
        );
    }

    #[test]
    fn test_io_is_transparent() {
        let err: EdvError = std::io::Error::other("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}
