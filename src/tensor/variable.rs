//! Raw arrays versus gradient-tracked tensors.

use super::{Tensor, TensorData, TensorError};
use ndarray::ArrayD;

/// A value handed to the deprocess helpers: plain data or a tracked tensor.
#[derive(Clone, Debug)]
pub enum Value {
    Raw(ArrayD<TensorData>),
    Tracked(Tensor),
}

impl From<ArrayD<TensorData>> for Value {
    fn from(data: ArrayD<TensorData>) -> Self {
        Value::Raw(data)
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Value::Tracked(tensor)
    }
}

impl From<&Tensor> for Value {
    fn from(tensor: &Tensor) -> Self {
        Value::Tracked(tensor.clone())
    }
}

/// Extracts the raw data: a tracked tensor yields a detached copy of its
/// storage, raw data passes through unchanged.
pub fn unpack_var(value: Value) -> Result<ArrayD<TensorData>, TensorError> {
    match value {
        Value::Raw(data) => Ok(data),
        Value::Tracked(tensor) => tensor.data_clone(),
    }
}
