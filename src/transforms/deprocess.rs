//! # Batch Deprocessing
//!
//! Two ways back from normalized tensors to pixel range:
//!
//! * `fast_*`: one broadcast expression over the whole batch built from
//!   [`crate::tensor::ops`], so gradients flow back to the input.
//! * [`imagenet_deprocess_batch`]: runs the composed [`imagenet_deprocess`]
//!   pipeline per sample (optionally with rescale) and returns bytes.

use image::{GrayImage, RgbImage};
use ndarray::{Array4, ArrayD, ArrayView3, Axis, Ix3, Ix4, IxDyn};
use std::path::Path;

use super::{imagenet_deprocess, NormalizeMethod, Transform, TransformError};
use crate::tensor::{ops, unpack_var, Tensor, TensorData, TensorError, Value};

const PIXEL_MAX: TensorData = 255.0;

/// Scales a `[0, 1]` value to a byte, saturating outside the range.
#[inline]
fn to_byte(value: TensorData) -> u8 {
    (value * PIXEL_MAX).clamp(0.0, PIXEL_MAX) as u8
}

/// Constant `[1, C, 1, 1]` tensor so per-channel stats broadcast over N, H and W.
fn channel_constant(values: &[TensorData]) -> Result<Tensor, TensorError> {
    let data = ArrayD::from_shape_vec(IxDyn(&[1, values.len(), 1, 1]), values.to_vec())?;
    Ok(Tensor::new(data, false))
}

/// Differentiable batch deprocess: `clamp((imgs * std + mean) * 255, 0, 255)`.
///
/// `imgs` must be `(N, C, H, W)`. The result stays on the autograd graph of
/// `imgs`, so it can sit inside a loss.
pub fn fast_imagenet_deprocess_batch(
    imgs: &Tensor,
    method: NormalizeMethod,
) -> Result<Tensor, TransformError> {
    if imgs.ndim() != 4 {
        return Err(TransformError::Shape(format!(
            "fast_imagenet_deprocess_batch expects (N, C, H, W), got {:?}",
            imgs.shape()
        )));
    }
    let profile = method.profile();
    let mean = channel_constant(profile.mean)?;
    let std = channel_constant(profile.std)?;

    let img_de = ops::add(&ops::mul(imgs, &std)?, &mean)?;
    let img_de = ops::clamp(&ops::mul_scalar(&img_de, PIXEL_MAX)?, 0.0, PIXEL_MAX)?;
    Ok(img_de)
}

/// Differentiable mel deprocess: `log_mels * std + mean` with the scalar
/// `vox_mel` statistics. No scaling or clamping.
pub fn fast_mel_deprocess_batch(
    log_mels: &Tensor,
    method: NormalizeMethod,
) -> Result<Tensor, TransformError> {
    let profile = match method {
        NormalizeMethod::VoxMel => method.profile(),
        other => {
            return Err(TransformError::UnsupportedMethod {
                op: "fast_mel_deprocess_batch",
                method: other,
            })
        }
    };
    let log_mels_de = ops::mul_scalar(log_mels, profile.std[0])?;
    Ok(ops::add_scalar(&log_mels_de, profile.mean[0])?)
}

/// Per-sample batch deprocess to bytes.
///
/// Input is a preprocessed `(N, C, H, W)` batch, raw or tracked; tracked
/// tensors are read through a detached copy. Output is `(N, C, H, W)` in `[0, 255]`.
pub fn imagenet_deprocess_batch(
    imgs: impl Into<Value>,
    rescale: bool,
    method: NormalizeMethod,
) -> Result<Array4<u8>, TransformError> {
    let imgs = unpack_var(imgs.into())?;
    let shape = imgs.shape().to_vec();
    let imgs = imgs.into_dimensionality::<Ix4>().map_err(|_| {
        TransformError::Shape(format!(
            "imagenet_deprocess_batch expects (N, C, H, W), got {shape:?}"
        ))
    })?;

    let deprocess_fn = imagenet_deprocess(rescale, method);
    let mut imgs_de = Vec::with_capacity(imgs.len_of(Axis(0)));
    for img in imgs.outer_iter() {
        let img_de = deprocess_fn.apply(img.to_owned().into_dyn())?;
        let img_de = img_de
            .mapv(to_byte)
            .into_dimensionality::<Ix3>()
            .map_err(TensorError::from)?;
        imgs_de.push(img_de);
    }

    if imgs_de.is_empty() {
        return Ok(Array4::zeros((0, shape[1], shape[2], shape[3])));
    }
    let views: Vec<_> = imgs_de.iter().map(|img| img.view()).collect();
    Ok(ndarray::stack(Axis(0), &views).map_err(TensorError::from)?)
}

/// Deprocesses one `(C, H, W)` image (with rescale) and writes it to
/// `save_path`; the format follows the file extension.
///
/// Three channels are written as RGB, one as grayscale.
pub fn deprocess_and_save<P: AsRef<Path>>(
    image: ArrayView3<'_, TensorData>,
    method: NormalizeMethod,
    save_path: P,
) -> Result<(), TransformError> {
    let path = save_path.as_ref();
    let deprocess_fn = imagenet_deprocess(true, method);
    let image = deprocess_fn
        .apply(image.to_owned().into_dyn())?
        .into_dimensionality::<Ix3>()
        .map_err(TensorError::from)?;

    let (channels, height, width) = image.dim();
    // Channel-last, row-major pixel order.
    let pixels: Vec<u8> = image
        .permuted_axes([1, 2, 0])
        .iter()
        .map(|&v| to_byte(v))
        .collect();

    let dimension = |n: usize| {
        u32::try_from(n).map_err(|_| TransformError::Shape(format!("image side {n} exceeds u32")))
    };
    let (width, height) = (dimension(width)?, dimension(height)?);
    let raw_len_error = || {
        TransformError::Shape(format!(
            "pixel buffer does not match {width}x{height}x{channels}"
        ))
    };

    let saved = match channels {
        3 => RgbImage::from_raw(width, height, pixels)
            .ok_or_else(raw_len_error)?
            .save(path),
        1 => GrayImage::from_raw(width, height, pixels)
            .ok_or_else(raw_len_error)?
            .save(path),
        n => {
            return Err(TransformError::Shape(format!(
                "deprocess_and_save expects 1 or 3 channels, got {n}"
            )))
        }
    };
    saved.map_err(|source| TransformError::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), %method, "saved deprocessed image");
    Ok(())
}
