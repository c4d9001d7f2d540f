// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImgfsError>;

#[derive(Error, Debug)]
pub enum ImgfsError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("(re|m|c)alloc failed")]
    OutOfMemory,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not enough arguments")]
    NotEnoughArguments,

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Invalid max_files number")]
    MaxFiles,

    #[error("Invalid resolution(s)")]
    InvalidResolution,

    #[error("Invalid image ID")]
    InvalidImgId,

    #[error("imgFS is full")]
    ImgfsFull,

    #[error("Image not found")]
    ImageNotFound,

    #[error("Existing image ID")]
    DuplicateId,

    #[error("Image library error: {0}")]
    ImageCodec(String),

    #[error("Threading error: {0}")]
    Threading(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ImgfsError {
    /// Stable process exit status for this error kind. `0` is reserved for success.
    pub fn code(&self) -> u8 {
        match self {
            ImgfsError::Io(_) => 1,
            ImgfsError::OutOfMemory => 2,
            ImgfsError::InvalidArgument(_) => 3,
            ImgfsError::NotEnoughArguments => 4,
            ImgfsError::InvalidCommand => 5,
            ImgfsError::MaxFiles => 6,
            ImgfsError::InvalidResolution => 7,
            ImgfsError::InvalidImgId => 8,
            ImgfsError::ImgfsFull => 9,
            ImgfsError::ImageNotFound => 10,
            ImgfsError::DuplicateId => 11,
            ImgfsError::ImageCodec(_) => 12,
            ImgfsError::Threading(_) => 13,
            ImgfsError::Protocol(_) => 14,
            ImgfsError::Runtime(_) => 15,
        }
    }
}

impl From<serde_json::Error> for ImgfsError {
    fn from(err: serde_json::Error) -> Self {
        ImgfsError::Runtime(err.to_string())
    }
}

impl From<image::ImageError> for ImgfsError {
    fn from(err: image::ImageError) -> Self {
        ImgfsError::ImageCodec(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for ImgfsError {
    fn from(_: std::collections::TryReserveError) -> Self {
        ImgfsError::OutOfMemory
    }
}
