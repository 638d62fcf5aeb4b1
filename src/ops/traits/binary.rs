//! Binary operations trait.

use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Element-wise binary operations on tensors.
///
/// All operations broadcast their operands NumPy-style: dimensions are
/// aligned from the trailing end, and a dimension of size 1 (or a missing
/// leading dimension) stretches to match the other operand. Outputs are
/// freshly allocated and contiguous.
///
/// # Example
///
/// ```ignore
/// use layernorm::prelude::*;
///
/// let device = CpuDevice::new();
/// let client = CpuRuntime::default_client(&device);
///
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);
/// let b = Tensor::<CpuRuntime>::from_slice(&[10.0f32, 20.0], &[2], &device);
///
/// let c = client.add(&a, &b)?; // [11.0, 22.0, 13.0, 24.0]
/// ```
pub trait BinaryOps<R: Runtime> {
    /// Element-wise addition: a + b
    ///
    /// # Errors
    /// `BroadcastError` if the shapes are not broadcastable, `DTypeMismatch`
    /// if the operands differ in dtype.
    fn add(&self, a: &Tensor<R>, b: &Tensor<R>) -> Result<Tensor<R>>;

    /// Element-wise subtraction: a - b
    fn sub(&self, a: &Tensor<R>, b: &Tensor<R>) -> Result<Tensor<R>>;

    /// Element-wise multiplication: a * b
    fn mul(&self, a: &Tensor<R>, b: &Tensor<R>) -> Result<Tensor<R>>;

    /// Element-wise division: a / b
    fn div(&self, a: &Tensor<R>, b: &Tensor<R>) -> Result<Tensor<R>>;

    /// Fused multiply-add: input + value * tensor1 * tensor2
    ///
    /// The product and the sum are evaluated with a single rounding step in
    /// f64 before narrowing to the operand dtype.
    ///
    /// # Arguments
    /// * `input` - Addend
    /// * `tensor1` - First factor
    /// * `tensor2` - Second factor
    /// * `value` - Scalar multiplier applied to `tensor1`
    ///
    /// All three tensors broadcast against each other.
    fn addcmul(
        &self,
        input: &Tensor<R>,
        tensor1: &Tensor<R>,
        tensor2: &Tensor<R>,
        value: f64,
    ) -> Result<Tensor<R>>;
}
