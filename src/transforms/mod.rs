//! # Image and Mel Transforms (`transforms`)
//!
//! Normalization profiles, the preprocess/deprocess pipeline builders, batch
//! deprocessing and windowed segmentation of mel-spectrograms.

use std::path::PathBuf;

use crate::tensor::TensorError;

// --- Submodules ---
pub mod deprocess;
pub mod normalize;
pub mod profile;
pub mod segment;

// --- Re-exports ---
pub use deprocess::{
    deprocess_and_save, fast_imagenet_deprocess_batch, fast_mel_deprocess_batch,
    imagenet_deprocess_batch,
};
pub use normalize::{
    rescale, Compose, Normalize, Rescale, Squeeze, ToTensor, Transform, RESCALE_EPS,
};
pub use profile::{
    InverseProfile, NormalizeMethod, Profile, IMAGENET_MEAN, IMAGENET_STD, STANDARD_MEAN,
    STANDARD_STD, VOX_MEL_MEAN, VOX_MEL_STD,
};
pub use segment::{num_windows, window_segment};

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("Unknown normalize method '{0}' (expected imagenet, standard or vox_mel)")]
    UnknownMethod(String),
    #[error("{op} does not support normalize method '{method}'")]
    UnsupportedMethod {
        op: &'static str,
        method: NormalizeMethod,
    },
    #[error("Invalid tensor shape: {0}")]
    Shape(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error("Failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

// --- Pipeline Builders ---

/// Forward normalization `x' = (x - mean) / std` for `method`.
pub fn imagenet_preprocess(method: NormalizeMethod) -> Normalize {
    let profile = method.profile();
    Normalize::new(profile.mean.to_vec(), profile.std.to_vec())
}

/// Inverse of [`imagenet_preprocess`], optionally followed by a min-max rescale.
///
/// Undoes the std scale first and the mean shift second, which together give
/// `x = x' * std + mean`.
pub fn imagenet_deprocess(rescale_image: bool, method: NormalizeMethod) -> Compose {
    let profile = method.profile();
    let inverse = profile.inverse();
    let channels = profile.channels();

    let mut transforms = Compose::default();
    transforms.push(Normalize::new(vec![0.0; channels], inverse.std));
    transforms.push(Normalize::new(inverse.mean, vec![1.0; channels]));
    if rescale_image {
        transforms.push(Rescale);
    }
    transforms
}

/// Mel-spectrogram input pipeline: to a `(1, H, W)` tensor, optional
/// normalization, then drop the singleton axes.
pub fn set_mel_transform(method: Option<NormalizeMethod>) -> Compose {
    tracing::info!(mel_normalize_method = ?method, "building mel transform");

    let mut mel_transform = Compose::default();
    mel_transform.push(ToTensor);
    if let Some(method) = method {
        mel_transform.push(imagenet_preprocess(method));
    }
    mel_transform.push(Squeeze);
    mel_transform
}
