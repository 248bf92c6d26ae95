//! # LDM Utils
//!
//! Shared helpers for the latent-diffusion image/mel pipeline:
//! file IO in three formats, named loggers, and the normalization and
//! deprocessing transforms for image and mel-spectrogram tensors.

pub mod tensor;
pub mod transforms;
pub mod utils;

pub use tensor::{unpack_var, Tensor, TensorError, Value};
pub use transforms::{
    deprocess_and_save, fast_imagenet_deprocess_batch, fast_mel_deprocess_batch,
    imagenet_deprocess, imagenet_deprocess_batch, imagenet_preprocess, rescale, set_mel_transform,
    window_segment, NormalizeMethod, Transform, TransformError,
};
pub use utils::{
    get_logger, load_json, load_pickle, load_yaml, save_json, save_pickle, save_yaml, Logger,
    LoggerError, SerializationError,
};
