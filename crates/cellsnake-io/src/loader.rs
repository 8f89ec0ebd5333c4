//! Loading an image file into everything a session needs.

use std::path::{Path, PathBuf};

use cellsnake_pipeline::{
    AnalysisConfig, AnalysisError, Dimensions, EdgeField, ImageId, edge_field_from_bytes,
};

/// Errors that can occur when loading an image file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes could not be turned into an edge field.
    #[error("{}: {source}", path.display())]
    Analysis {
        path: PathBuf,
        #[source]
        source: AnalysisError,
    },
}

/// A decoded image with its identifier and edge field.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Identifier taken from the file stem.
    pub image_id: ImageId,
    /// Extent of the decoded image.
    pub dimensions: Dimensions,
    /// Edge field the session refines against.
    pub field: EdgeField,
}

/// Read and decode the image at `path` and build its edge field with
/// `config`'s blur.
///
/// # Errors
///
/// [`LoadError::Read`] when the file is unreadable,
/// [`LoadError::Analysis`] when it is empty or not a supported image.
pub fn load_image(path: &Path, config: &AnalysisConfig) -> Result<LoadedImage, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let field = edge_field_from_bytes(&bytes, config).map_err(|source| LoadError::Analysis {
        path: path.to_path_buf(),
        source,
    })?;
    let image_id = ImageId::from_path(path);
    let dimensions = field.dimensions();
    log::info!("loaded {image_id} ({dimensions}) from {}", path.display());
    Ok(LoadedImage {
        image_id,
        dimensions,
        field,
    })
}
