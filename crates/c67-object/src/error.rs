//! Container-writer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error(transparent)]
    Link(#[from] c67_codegen::LinkError),

    #[error("header serialization failed: {0}")]
    Serialize(String),

    #[error("no container format for target {0}")]
    NoContainer(c67_codegen::Target),

    #[error("library '{0}' not found in the search path")]
    LibraryNotFound(String),

    #[error("image layout exceeds the container's address range: {0}")]
    AddressRange(String),
}

impl From<scroll::Error> for ObjectError {
    fn from(e: scroll::Error) -> Self {
        ObjectError::Serialize(e.to_string())
    }
}
