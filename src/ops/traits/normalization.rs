//! Normalization operations traits.

use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Result of a layer-norm forward pass
#[derive(Clone, Debug)]
pub struct LayerNormOutput<R: Runtime> {
    /// Normalized (and optionally affine-transformed) input, same shape as the input
    pub output: Tensor<R>,
    /// Per-row mean, shaped `[outer..., 1, ..., 1]`
    pub mean: Tensor<R>,
    /// Per-row reciprocal standard deviation `1 / sqrt(var + eps)`, same shape as `mean`
    pub rstd: Tensor<R>,
}

/// Gradients produced by a layer-norm backward pass
///
/// A field is `None` when its [`GradMask`] flag was off, or when the
/// corresponding parameter was absent from the forward pass.
#[derive(Clone, Debug)]
pub struct LayerNormGrads<R: Runtime> {
    /// Gradient with respect to the input, shaped like the input
    pub grad_input: Option<Tensor<R>>,
    /// Gradient with respect to the weight, shaped like the weight
    pub grad_weight: Option<Tensor<R>>,
    /// Gradient with respect to the bias, shaped like the bias
    pub grad_bias: Option<Tensor<R>>,
}

/// Result of a training-mode batch-norm reduction
#[derive(Clone, Debug)]
pub struct BatchNormOutput<R: Runtime> {
    /// Normalized input, same shape as the input
    pub output: Tensor<R>,
    /// Per-channel mean, shape `[C]`
    pub mean: Tensor<R>,
    /// Per-channel reciprocal standard deviation, shape `[C]`
    pub rstd: Tensor<R>,
}

/// Selects which layer-norm gradients a backward pass materializes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GradMask {
    /// Compute the input gradient
    pub input: bool,
    /// Compute the weight gradient
    pub weight: bool,
    /// Compute the bias gradient
    pub bias: bool,
}

impl GradMask {
    /// Request every gradient
    pub const fn all() -> Self {
        Self {
            input: true,
            weight: true,
            bias: true,
        }
    }

    /// Request no gradient
    pub const fn none() -> Self {
        Self {
            input: false,
            weight: false,
            bias: false,
        }
    }

    /// Whether at least one gradient is requested
    pub const fn any(self) -> bool {
        self.input || self.weight || self.bias
    }
}

impl From<[bool; 3]> for GradMask {
    fn from([input, weight, bias]: [bool; 3]) -> Self {
        Self {
            input,
            weight,
            bias,
        }
    }
}

/// Layer normalization over the trailing dimensions of a tensor
///
/// The input of shape `[outer..., normalized...]` is viewed as `M` rows of `N`
/// elements, where `normalized` equals `normalized_shape`. Every row is
/// normalized independently:
///
/// ```text
/// y = (x - mean) * rstd * weight + bias,   rstd = 1 / sqrt(var + eps)
/// ```
///
/// with the biased variance. `weight` and `bias`, when given, must have
/// exactly `normalized_shape` as their shape.
///
/// # Errors
///
/// All operations validate shapes before touching data:
/// - `InvalidArgument` if `normalized_shape` is empty or longer than the input rank
/// - `ShapeMismatch` if the input's trailing dims, `weight` or `bias` disagree
///   with `normalized_shape`
/// - `DTypeMismatch` if the operands do not share the input's dtype
pub trait LayerNormOps<R: Runtime> {
    /// Fused layer-norm forward using the kernel registered for the input's device
    ///
    /// Returns the output together with the saved statistics needed by
    /// [`native_layer_norm_backward`](Self::native_layer_norm_backward).
    /// An input with zero rows yields empty outputs without launching a kernel.
    ///
    /// # Arguments
    ///
    /// * `input` - Input tensor of shape `[outer..., normalized...]`
    /// * `normalized_shape` - Trailing dimensions to normalize over (at least one)
    /// * `weight` - Optional scale (gamma) of shape `normalized_shape`
    /// * `bias` - Optional shift (beta) of shape `normalized_shape`
    /// * `eps` - Variance stabilizer (typically 1e-5)
    ///
    /// # Errors
    ///
    /// `KernelNotRegistered` if no fused kernel exists for the input's device.
    fn native_layer_norm(
        &self,
        input: &Tensor<R>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<R>>,
        bias: Option<&Tensor<R>>,
        eps: f64,
    ) -> Result<LayerNormOutput<R>>;

    /// Fused layer-norm forward writing into a caller-provided buffer
    ///
    /// `out` must be contiguous, match the input's shape and dtype, and must
    /// not share storage with any operand. The statistics are discarded.
    fn native_layer_norm_out(
        &self,
        input: &Tensor<R>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<R>>,
        bias: Option<&Tensor<R>>,
        eps: f64,
        out: &mut Tensor<R>,
    ) -> Result<()>;

    /// Layer-norm forward composed from [`BatchNormOps`] and [`BinaryOps`](super::BinaryOps)
    ///
    /// Numerically equivalent to [`native_layer_norm`](Self::native_layer_norm)
    /// within floating-point tolerance; usable on devices without a fused kernel.
    fn math_layer_norm(
        &self,
        input: &Tensor<R>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<R>>,
        bias: Option<&Tensor<R>>,
        eps: f64,
    ) -> Result<LayerNormOutput<R>>;

    /// Layer-norm forward returning only the output
    ///
    /// Uses the fused kernel when one is registered for the input's device and
    /// the composed fallback otherwise.
    fn layer_norm(
        &self,
        input: &Tensor<R>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<R>>,
        bias: Option<&Tensor<R>>,
        eps: f64,
    ) -> Result<Tensor<R>>;

    /// Fused layer-norm backward
    ///
    /// # Arguments
    ///
    /// * `grad_out` - Upstream gradient, same shape as `input`
    /// * `input` - Forward input
    /// * `normalized_shape` - Same value passed to the forward pass
    /// * `mean`, `rstd` - Statistics saved by the forward pass (`M` elements each)
    /// * `weight`, `bias` - Parameters of the forward pass
    /// * `mask` - Which gradients to compute
    ///
    /// With zero rows, requested parameter gradients are zero-filled and no
    /// kernel runs. With an all-false mask no kernel runs either.
    #[allow(clippy::too_many_arguments)]
    fn native_layer_norm_backward(
        &self,
        grad_out: &Tensor<R>,
        input: &Tensor<R>,
        normalized_shape: &[usize],
        mean: &Tensor<R>,
        rstd: &Tensor<R>,
        weight: Option<&Tensor<R>>,
        bias: Option<&Tensor<R>>,
        mask: GradMask,
    ) -> Result<LayerNormGrads<R>>;
}

/// Batch normalization statistics in training mode
pub trait BatchNormOps<R: Runtime> {
    /// Normalize `[B, C, *]` over every dimension except the channel axis
    ///
    /// Computes per-channel biased statistics over the batch and spatial
    /// dimensions and returns the normalized tensor with `mean` and `rstd`
    /// of shape `[C]`. No affine transform is applied.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the input has fewer than 2 dimensions.
    fn batch_norm_training(&self, input: &Tensor<R>, eps: f64) -> Result<BatchNormOutput<R>>;
}
