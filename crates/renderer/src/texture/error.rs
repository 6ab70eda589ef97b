use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to open image {}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported pixel layout: expected {expected} bytes per row for {width}x{height} RGBA8, found {actual} ({len} bytes total)")]
    UnsupportedFormat {
        width: u32,
        height: u32,
        expected: u64,
        actual: u64,
        len: usize,
    },

    #[error("cannot upload an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },

    #[error("{width}x{height} image exceeds the GPU limit of {max} pixels per side")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("texture has already been deleted")]
    Deleted,

    #[error("texture \"{0}\" was not found in memory")]
    NotFound(String),
}

impl TextureError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
