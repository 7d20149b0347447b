//! Asset loading errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from texture and shader loading.
#[derive(Error, Debug)]
pub enum AssetError {
    /// The image file could not be read or decoded.
    #[error("Failed to load texture image: {path}: {reason}")]
    TextureLoad { path: PathBuf, reason: String },

    /// The shader file could not be read.
    #[error("Failed to read shader file: {path}: {source}")]
    ShaderRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// GPU-side failure while creating or uploading the resource.
    #[error(transparent)]
    Gpu(#[from] aether_gpu::GpuError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, AssetError>;
