//! # Tensor Operations
//!
//! Elementwise operations with NumPy-style broadcasting and autograd support.
//! These are the building blocks of the differentiable batch deprocess path.

use super::autograd::{AutogradContext, BackwardOp};
use super::{Tensor, TensorData, TensorError};
use ndarray::{ArrayD, Axis, IxDyn};
use std::sync::Arc;

// --- Helper Function for Autograd Setup ---

/// Wraps an op result, recording the graph edge only when an input is tracked.
fn create_op_result(
    result_data: ArrayD<TensorData>,
    inputs: Vec<Tensor>,
    backward_op: Box<dyn BackwardOp>,
) -> Tensor {
    if inputs.iter().any(|t| t.requires_grad()) {
        let grad_context = Arc::new(AutogradContext::new(inputs, backward_op));
        Tensor::from_op(result_data, grad_context)
    } else {
        Tensor::new(result_data, false)
    }
}

// --- Broadcasting ---

/// Checks if tensor shapes can be broadcast together following NumPy broadcasting rules.
pub fn can_broadcast(shape1: &[usize], shape2: &[usize]) -> bool {
    shape1
        .iter()
        .rev()
        .zip(shape2.iter().rev())
        .all(|(&s1, &s2)| s1 == s2 || s1 == 1 || s2 == 1)
}

/// Determines the output shape after broadcasting two shapes.
pub fn broadcast_shapes(shape1: &[usize], shape2: &[usize]) -> Result<Vec<usize>, TensorError> {
    if !can_broadcast(shape1, shape2) {
        return Err(TensorError::IncompatibleShapes {
            op: "broadcast".to_string(),
            shape1: shape1.to_vec(),
            shape2: shape2.to_vec(),
        });
    }

    let max_dims = shape1.len().max(shape2.len());
    let padded_shape1 = pad_shape_left(shape1, max_dims);
    let padded_shape2 = pad_shape_left(shape2, max_dims);

    Ok(padded_shape1
        .iter()
        .zip(&padded_shape2)
        .map(|(&s1, &s2)| if s1 == 1 { s2 } else { s1 })
        .collect())
}

/// Pads a shape with 1s on the left to match the target length.
fn pad_shape_left(shape: &[usize], target_len: usize) -> Vec<usize> {
    let mut padded = vec![1; target_len.saturating_sub(shape.len())];
    padded.extend_from_slice(shape);
    padded
}

/// Sums a broadcast gradient back down to `target` shape.
pub(crate) fn sum_to_shape(
    grad: &ArrayD<TensorData>,
    target: &[usize],
) -> Result<ArrayD<TensorData>, TensorError> {
    let mut reduced = grad.clone();
    while reduced.ndim() > target.len() {
        reduced = reduced.sum_axis(Axis(0));
    }
    for (axis, &size) in target.iter().enumerate() {
        if size == 1 && reduced.shape()[axis] != 1 {
            reduced = reduced.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
    }
    if reduced.shape() != target {
        return Err(TensorError::ShapeMismatch {
            expected: target.to_vec(),
            got: reduced.shape().to_vec(),
        });
    }
    Ok(reduced)
}

/// Applies `f` to `a` and `b` broadcast to their common shape.
fn broadcast_binary(
    op: &str,
    a: &Tensor,
    b: &Tensor,
    f: impl Fn(TensorData, TensorData) -> TensorData,
) -> Result<ArrayD<TensorData>, TensorError> {
    let output_shape = broadcast_shapes(a.shape(), b.shape())?;
    let incompatible = || TensorError::IncompatibleShapes {
        op: op.to_string(),
        shape1: a.shape().to_vec(),
        shape2: b.shape().to_vec(),
    };

    let a_data = a.data()?;
    let b_data = b.data()?;
    let a_view = a_data
        .broadcast(IxDyn(&output_shape))
        .ok_or_else(incompatible)?;
    let b_view = b_data
        .broadcast(IxDyn(&output_shape))
        .ok_or_else(incompatible)?;

    let mut result = ArrayD::<TensorData>::zeros(IxDyn(&output_shape));
    ndarray::Zip::from(&mut result)
        .and(&a_view)
        .and(&b_view)
        .for_each(|out, &x, &y| *out = f(x, y));
    Ok(result)
}

// --- Arithmetic Operations ---

/// Element-wise addition with broadcasting.
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = broadcast_binary("add", a, b, |x, y| x + y)?;
    Ok(create_op_result(
        result_data,
        vec![a.clone(), b.clone()],
        Box::new(AddBackward),
    ))
}

/// Element-wise multiplication with broadcasting.
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = broadcast_binary("mul", a, b, |x, y| x * y)?;
    Ok(create_op_result(
        result_data,
        vec![a.clone(), b.clone()],
        Box::new(MulBackward),
    ))
}

/// Adds a constant to every element.
pub fn add_scalar(a: &Tensor, scalar: TensorData) -> Result<Tensor, TensorError> {
    let result_data = a.data()?.mapv(|v| v + scalar);
    Ok(create_op_result(
        result_data,
        vec![a.clone()],
        Box::new(AddScalarBackward),
    ))
}

/// Multiplies every element by a constant.
pub fn mul_scalar(a: &Tensor, scalar: TensorData) -> Result<Tensor, TensorError> {
    let result_data = a.data()?.mapv(|v| v * scalar);
    Ok(create_op_result(
        result_data,
        vec![a.clone()],
        Box::new(MulScalarBackward { scalar }),
    ))
}

/// Clamps every element into `[min, max]`.
pub fn clamp(a: &Tensor, min: TensorData, max: TensorData) -> Result<Tensor, TensorError> {
    let result_data = a.data()?.mapv(|v| v.clamp(min, max));
    Ok(create_op_result(
        result_data,
        vec![a.clone()],
        Box::new(ClampBackward { min, max }),
    ))
}

// --- Backward Ops ---

#[derive(Debug)]
struct AddBackward;

impl BackwardOp for AddBackward {
    fn backward(
        &self,
        inputs: &[Tensor],
        output_grad: &ArrayD<TensorData>,
    ) -> Result<Vec<ArrayD<TensorData>>, TensorError> {
        inputs
            .iter()
            .map(|input| sum_to_shape(output_grad, input.shape()))
            .collect()
    }
}

#[derive(Debug)]
struct MulBackward;

impl BackwardOp for MulBackward {
    fn backward(
        &self,
        inputs: &[Tensor],
        output_grad: &ArrayD<TensorData>,
    ) -> Result<Vec<ArrayD<TensorData>>, TensorError> {
        let [a, b] = inputs else {
            return Err(TensorError::AutogradError(format!(
                "MulBackward expects 2 inputs, got {}",
                inputs.len()
            )));
        };
        // d(a*b)/da = b, d(a*b)/db = a
        let grad_a = scale_by(output_grad, &*b.data()?)?;
        let grad_b = scale_by(output_grad, &*a.data()?)?;
        Ok(vec![
            sum_to_shape(&grad_a, a.shape())?,
            sum_to_shape(&grad_b, b.shape())?,
        ])
    }
}

/// `grad * other`, with `other` broadcast up to the gradient's shape.
fn scale_by(
    grad: &ArrayD<TensorData>,
    other: &ArrayD<TensorData>,
) -> Result<ArrayD<TensorData>, TensorError> {
    let other = other
        .broadcast(grad.raw_dim())
        .ok_or_else(|| TensorError::IncompatibleShapes {
            op: "mul backward".to_string(),
            shape1: grad.shape().to_vec(),
            shape2: other.shape().to_vec(),
        })?;
    Ok(grad * &other)
}

#[derive(Debug)]
struct AddScalarBackward;

impl BackwardOp for AddScalarBackward {
    fn backward(
        &self,
        _inputs: &[Tensor],
        output_grad: &ArrayD<TensorData>,
    ) -> Result<Vec<ArrayD<TensorData>>, TensorError> {
        Ok(vec![output_grad.clone()])
    }
}

#[derive(Debug)]
struct MulScalarBackward {
    scalar: TensorData,
}

impl BackwardOp for MulScalarBackward {
    fn backward(
        &self,
        _inputs: &[Tensor],
        output_grad: &ArrayD<TensorData>,
    ) -> Result<Vec<ArrayD<TensorData>>, TensorError> {
        Ok(vec![output_grad * self.scalar])
    }
}

#[derive(Debug)]
struct ClampBackward {
    min: TensorData,
    max: TensorData,
}

impl BackwardOp for ClampBackward {
    fn backward(
        &self,
        inputs: &[Tensor],
        output_grad: &ArrayD<TensorData>,
    ) -> Result<Vec<ArrayD<TensorData>>, TensorError> {
        let [input] = inputs else {
            return Err(TensorError::AutogradError(format!(
                "ClampBackward expects 1 input, got {}",
                inputs.len()
            )));
        };
        let input = input.data()?;
        let mut grad = output_grad.clone();
        // Gradient only passes where the input was inside the clamp range.
        ndarray::Zip::from(&mut grad)
            .and(&*input)
            .for_each(|g, &x| {
                if x < self.min || x > self.max {
                    *g = 0.0;
                }
            });
        Ok(vec![grad])
    }
}
