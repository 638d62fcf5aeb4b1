//! Arithmetic operation helpers
//!
//! Shared by the elementwise [`BinaryOps`](super::BinaryOps) implementations:
//! the operation kind and the broadcast/dtype checks every backend runs before
//! launching a kernel.

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::tensor::broadcast_shapes;

/// Compute the output shape for binary operations with broadcasting
///
/// Returns `Error::BroadcastError` if the shapes are incompatible.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    broadcast_shapes(a, b)
        .map(|shape| shape.to_vec())
        .ok_or_else(|| Error::broadcast(a, b))
}

/// Require every operand of an elementwise op to share one dtype
pub fn validate_same_dtype(lhs: DType, rhs: &[DType]) -> Result<()> {
    match rhs.iter().find(|&&d| d != lhs) {
        Some(&d) => Err(Error::DTypeMismatch { lhs, rhs: d }),
        None => Ok(()),
    }
}

/// Binary operation kind
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition: a + b
    Add,
    /// Subtraction: a - b
    Sub,
    /// Multiplication: a * b
    Mul,
    /// Division: a / b
    Div,
}

impl BinaryOp {
    /// Operation name used in error messages and logs
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }
}
