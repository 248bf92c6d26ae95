//! # Composable Array Transforms
//!
//! Per-sample transforms over `ArrayD<f32>`, composed with [`Compose`].
//! Image tensors are channel-first: `(C, H, W)` or `(N, C, H, W)`.

use ndarray::{ArrayD, Axis, IxDyn};
use std::fmt::Debug;

use super::TransformError;
use crate::tensor::{TensorData, TensorError};

/// Added to the range in [`rescale`] so constant inputs stay finite.
pub const RESCALE_EPS: TensorData = 1e-5;

/// A single step of a preprocessing or deprocessing pipeline.
pub trait Transform: Debug + Send + Sync {
    fn apply(&self, input: ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TransformError>;
}

// --- Normalize ---

/// Channel-wise `x' = (x - mean[c]) / std[c]`.
///
/// The channel axis is the third from last, so both `(C, H, W)` and
/// `(N, C, H, W)` inputs work. A single-element mean/std applies to every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalize {
    mean: Vec<TensorData>,
    std: Vec<TensorData>,
}

impl Normalize {
    pub fn new(mean: Vec<TensorData>, std: Vec<TensorData>) -> Self {
        Normalize { mean, std }
    }

    pub fn mean(&self) -> &[TensorData] {
        &self.mean
    }

    pub fn std(&self) -> &[TensorData] {
        &self.std
    }
}

fn per_channel(
    name: &str,
    values: &[TensorData],
    channels: usize,
) -> Result<Vec<TensorData>, TransformError> {
    match values.len() {
        1 => Ok(vec![values[0]; channels]),
        n if n == channels => Ok(values.to_vec()),
        n => Err(TransformError::Shape(format!(
            "Normalize {name} has {n} values but the input has {channels} channels"
        ))),
    }
}

impl Transform for Normalize {
    fn apply(&self, input: ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TransformError> {
        if input.ndim() < 3 {
            return Err(TransformError::Shape(format!(
                "Normalize expects a (..., C, H, W) tensor, got shape {:?}",
                input.shape()
            )));
        }
        let channel_axis = input.ndim() - 3;
        let channels = input.shape()[channel_axis];
        let mean = per_channel("mean", &self.mean, channels)?;
        let std = per_channel("std", &self.std, channels)?;

        let mut output = input;
        for (c, mut lane) in output.axis_iter_mut(Axis(channel_axis)).enumerate() {
            let (m, s) = (mean[c], std[c]);
            lane.mapv_inplace(|v| (v - m) / s);
        }
        Ok(output)
    }
}

// --- Rescale ---

/// Min-max rescale to `[0, 1]`: `(x - min) / (max - min + eps)`.
pub fn rescale(input: ArrayD<TensorData>) -> ArrayD<TensorData> {
    if input.is_empty() {
        return input;
    }
    let (lo, hi) = input
        .iter()
        .fold((TensorData::INFINITY, TensorData::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo + RESCALE_EPS;
    input.mapv_into(|v| (v - lo) / range)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Rescale;

impl Transform for Rescale {
    fn apply(&self, input: ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TransformError> {
        Ok(rescale(input))
    }
}

// --- Layout transforms ---

/// Converts `(H, W)` to `(1, H, W)` and `(H, W, C)` to `(C, H, W)`.
/// Values are not scaled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl Transform for ToTensor {
    fn apply(&self, input: ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TransformError> {
        match input.ndim() {
            2 => Ok(input.insert_axis(Axis(0))),
            3 => Ok(input
                .permuted_axes(IxDyn(&[2, 0, 1]))
                .as_standard_layout()
                .into_owned()),
            _ => Err(TransformError::Shape(format!(
                "ToTensor expects an (H, W) or (H, W, C) array, got shape {:?}",
                input.shape()
            ))),
        }
    }
}

/// Removes every length-1 axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Squeeze;

impl Transform for Squeeze {
    fn apply(&self, input: ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TransformError> {
        let kept: Vec<usize> = input.shape().iter().copied().filter(|&d| d != 1).collect();
        let input = if input.is_standard_layout() {
            input
        } else {
            input.as_standard_layout().into_owned()
        };
        Ok(input
            .into_shape(IxDyn(&kept))
            .map_err(TensorError::from)?)
    }
}

// --- Compose ---

/// Applies a list of transforms in order.
#[derive(Debug, Default)]
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Compose { transforms }
    }

    pub fn push(&mut self, transform: impl Transform + 'static) {
        self.transforms.push(Box::new(transform));
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&self, input: ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TransformError> {
        self.transforms
            .iter()
            .try_fold(input, |x, transform| transform.apply(x))
    }
}
