//! # Tensor Module
//!
//! Defines the `Tensor` struct used by the differentiable deprocess helpers:
//! an `ndarray::ArrayD` behind shared storage plus the bookkeeping the
//! reverse-mode engine in [`autograd`] needs.

use ndarray::{ArrayD, IxDyn};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

// --- Submodules ---
pub mod autograd;
pub mod ops;
pub mod variable;

// --- Re-exports ---
pub use autograd::{AutogradContext, BackwardOp};
pub use variable::{unpack_var, Value};

// --- Error Handling ---
#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Incompatible shapes for operation {op}: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        op: String,
        shape1: Vec<usize>,
        shape2: Vec<usize>,
    },
    #[error("Operation requires gradient but tensor does not have it")]
    RequiresGradNotSet,
    #[error("ndarray error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error("Autograd error: {0}")]
    AutogradError(String),
    #[error("Tensor lock poisoned")]
    LockPoisoned,
}

/// Element type of every tensor in the crate.
pub type TensorData = f32;

/// # Tensor
///
/// Wraps an `ndarray::ArrayD` for storage and carries autograd metadata.
/// Cloning is cheap and shares both data and gradient storage.
#[derive(Clone, Debug)]
pub struct Tensor {
    data: Arc<RwLock<ArrayD<TensorData>>>,
    shape: Vec<usize>,

    // Set on tensors produced by an op that saw at least one tracked input.
    grad_context: Option<Arc<AutogradContext>>,
    // Gradient accumulated on a leaf after `backward`.
    grad: Arc<Mutex<Option<ArrayD<TensorData>>>>,

    requires_grad: bool,
}

impl Tensor {
    /// Creates a new leaf Tensor from an ndarray::ArrayD.
    pub fn new(data: ArrayD<TensorData>, requires_grad: bool) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            data: Arc::new(RwLock::new(data)),
            shape,
            grad_context: None,
            grad: Arc::new(Mutex::new(None)),
            requires_grad,
        }
    }

    /// Creates a Tensor that is the result of an operation.
    pub(crate) fn from_op(data: ArrayD<TensorData>, grad_context: Arc<AutogradContext>) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            data: Arc::new(RwLock::new(data)),
            shape,
            grad_context: Some(grad_context),
            grad: Arc::new(Mutex::new(None)),
            requires_grad: true,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// A leaf is a tensor created directly rather than by an op.
    pub fn is_leaf(&self) -> bool {
        self.grad_context.is_none()
    }

    pub(crate) fn grad_context(&self) -> Option<&Arc<AutogradContext>> {
        self.grad_context.as_ref()
    }

    /// Identity of the graph node, shared by clones.
    pub(crate) fn node_id(&self) -> usize {
        Arc::as_ptr(&self.grad) as usize
    }

    /// Read-only access to the underlying data.
    pub fn data(&self) -> Result<RwLockReadGuard<'_, ArrayD<TensorData>>, TensorError> {
        self.data.read().map_err(|_| TensorError::LockPoisoned)
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> Result<ArrayD<TensorData>, TensorError> {
        Ok(self.data()?.clone())
    }

    /// Returns a new tensor sharing the same data but without autograd history.
    pub fn detach(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
            shape: self.shape.clone(),
            grad_context: None,
            grad: Arc::new(Mutex::new(None)),
            requires_grad: false,
        }
    }

    /// Gradient accumulated by previous `backward` calls, if any.
    pub fn grad(&self) -> Result<Option<ArrayD<TensorData>>, TensorError> {
        let grad = self.grad.lock().map_err(|_| TensorError::LockPoisoned)?;
        Ok(grad.clone())
    }

    pub fn zero_grad(&self) -> Result<(), TensorError> {
        let mut grad = self.grad.lock().map_err(|_| TensorError::LockPoisoned)?;
        if let Some(existing) = grad.as_mut() {
            existing.fill(0.0);
        }
        Ok(())
    }

    pub(crate) fn accumulate_grad(&self, incoming: ArrayD<TensorData>) -> Result<(), TensorError> {
        if incoming.shape() != self.shape() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.clone(),
                got: incoming.shape().to_vec(),
            });
        }
        let mut grad = self.grad.lock().map_err(|_| TensorError::LockPoisoned)?;
        match grad.as_mut() {
            Some(existing) => *existing += &incoming,
            None => *grad = Some(incoming),
        }
        Ok(())
    }

    /// Backpropagates from a single-element tensor, seeding its gradient with 1.
    pub fn backward(&self) -> Result<(), TensorError> {
        if self.size() != 1 {
            return Err(TensorError::AutogradError(format!(
                "backward() without a seed gradient needs a single-element tensor, got shape {:?}",
                self.shape
            )));
        }
        autograd::backward(self, ArrayD::ones(IxDyn(&self.shape)))
    }

    /// Backpropagates from this tensor with an explicit seed gradient of the same shape.
    pub fn backward_with(&self, gradient: ArrayD<TensorData>) -> Result<(), TensorError> {
        autograd::backward(self, gradient)
    }
}

// --- Operator Overloading ---
use std::ops::{Add, Mul};

impl Add<&Tensor> for &Tensor {
    type Output = Result<Tensor, TensorError>;

    fn add(self, other: &Tensor) -> Self::Output {
        ops::add(self, other)
    }
}

impl Mul<&Tensor> for &Tensor {
    type Output = Result<Tensor, TensorError>;

    fn mul(self, other: &Tensor) -> Self::Output {
        ops::mul(self, other)
    }
}

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize], requires_grad: bool) -> Tensor {
    Tensor::new(ArrayD::zeros(IxDyn(shape)), requires_grad)
}

/// Helper to create a tensor filled with ones.
pub fn ones(shape: &[usize], requires_grad: bool) -> Tensor {
    Tensor::new(ArrayD::ones(IxDyn(shape)), requires_grad)
}
