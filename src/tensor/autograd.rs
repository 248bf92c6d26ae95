//! # Automatic Differentiation (Autograd)
//!
//! Reverse-mode differentiation over the graph built by [`super::ops`].
//! Each op output keeps an [`AutogradContext`] holding its inputs and the
//! [`BackwardOp`] that maps the output gradient to input gradients.

use super::{Tensor, TensorData, TensorError};
use ndarray::ArrayD;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

// --- Backward Operation Trait ---

/// Backward pass of a single operation.
pub trait BackwardOp: Debug + Send + Sync + 'static {
    /// Computes one gradient per input, each shaped like that input.
    ///
    /// # Arguments
    /// * `inputs` - The input tensors of the forward operation.
    /// * `output_grad` - Gradient flowing into the operation's output.
    fn backward(
        &self,
        inputs: &[Tensor],
        output_grad: &ArrayD<TensorData>,
    ) -> Result<Vec<ArrayD<TensorData>>, TensorError>;
}

// --- Autograd Context ---

/// Stores what the backward pass of one operation needs.
#[derive(Debug)]
pub struct AutogradContext {
    op: Box<dyn BackwardOp>,
    inputs: Vec<Tensor>,
}

impl AutogradContext {
    pub fn new(inputs: Vec<Tensor>, op: Box<dyn BackwardOp>) -> Self {
        AutogradContext { op, inputs }
    }

    pub fn inputs(&self) -> &[Tensor] {
        &self.inputs
    }

    /// Runs the op's backward and checks it produced one gradient per input.
    pub fn execute_backward(
        &self,
        output_grad: &ArrayD<TensorData>,
    ) -> Result<Vec<ArrayD<TensorData>>, TensorError> {
        let input_grads = self.op.backward(&self.inputs, output_grad)?;
        if input_grads.len() != self.inputs.len() {
            return Err(TensorError::AutogradError(format!(
                "Backward op {:?} produced {} gradients, but expected {}",
                self.op,
                input_grads.len(),
                self.inputs.len()
            )));
        }
        Ok(input_grads)
    }
}

// --- Main Backward Function ---

/// Performs the backward pass starting from `root`.
///
/// Gradients of intermediate nodes are summed while walking the graph in
/// reverse topological order; leaves that require grad receive the result
/// in their gradient cell.
pub fn backward(root: &Tensor, initial_gradient: ArrayD<TensorData>) -> Result<(), TensorError> {
    if !root.requires_grad() {
        return Err(TensorError::RequiresGradNotSet);
    }
    if initial_gradient.shape() != root.shape() {
        return Err(TensorError::ShapeMismatch {
            expected: root.shape().to_vec(),
            got: initial_gradient.shape().to_vec(),
        });
    }

    let mut order = Vec::new();
    let mut visited = HashSet::new();
    topological_order(root, &mut visited, &mut order);

    let mut pending: HashMap<usize, ArrayD<TensorData>> = HashMap::new();
    pending.insert(root.node_id(), initial_gradient);

    // Post-order reversed: every node is reached before any of its inputs.
    for node in order.iter().rev() {
        let Some(grad) = pending.remove(&node.node_id()) else {
            continue;
        };
        match node.grad_context() {
            Some(ctx) => {
                let input_grads = ctx.execute_backward(&grad)?;
                for (input, input_grad) in ctx.inputs().iter().zip(input_grads) {
                    if !input.requires_grad() {
                        continue;
                    }
                    match pending.entry(input.node_id()) {
                        Entry::Occupied(mut slot) => *slot.get_mut() += &input_grad,
                        Entry::Vacant(slot) => {
                            slot.insert(input_grad);
                        }
                    }
                }
            }
            None => node.accumulate_grad(grad)?,
        }
    }

    Ok(())
}

fn topological_order(tensor: &Tensor, visited: &mut HashSet<usize>, order: &mut Vec<Tensor>) {
    if !tensor.requires_grad() || !visited.insert(tensor.node_id()) {
        return;
    }
    if let Some(ctx) = tensor.grad_context() {
        for input in ctx.inputs() {
            topological_order(input, visited, order);
        }
    }
    order.push(tensor.clone());
}
