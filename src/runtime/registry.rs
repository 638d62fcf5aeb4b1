//! Kernel registry: device type to fused kernel entry points
//!
//! Fused operations do not hard-code a backend. The orchestration layer asks
//! the client's [`KernelRegistry`] for the entry point registered under the
//! operand device's [`DeviceType`] and calls it with a bundle of contiguous
//! operands and preallocated outputs. Backends fill the registry once, when
//! their default client is first built.

use super::{DeviceType, Runtime};
use crate::error::{Error, Result};
use crate::tensor::Tensor;
use std::collections::HashMap;
use std::fmt;

/// Operands of a fused layer-norm forward kernel
///
/// Every tensor is contiguous. `output` has the input's shape; `mean` and
/// `rstd` hold `m` elements each. The kernel fills all three.
pub struct LayerNormForwardArgs<'a, R: Runtime> {
    /// Input viewed as `m` rows of `n` elements
    pub input: &'a Tensor<R>,
    /// Scale, `n` elements
    pub weight: Option<&'a Tensor<R>>,
    /// Shift, `n` elements
    pub bias: Option<&'a Tensor<R>>,
    /// Normalized output
    pub output: &'a mut Tensor<R>,
    /// Per-row mean
    pub mean: &'a mut Tensor<R>,
    /// Per-row reciprocal standard deviation
    pub rstd: &'a mut Tensor<R>,
    /// Number of rows
    pub m: usize,
    /// Elements per row
    pub n: usize,
    /// Added to the variance under the square root
    pub eps: f64,
}

/// Operands of a fused layer-norm backward kernel
///
/// Every tensor is contiguous. Only the requested gradients are present;
/// `grad_weight` and `grad_bias` must be fully overwritten, not accumulated into.
pub struct LayerNormBackwardArgs<'a, R: Runtime> {
    /// Gradient of the loss w.r.t. the forward output
    pub grad_out: &'a Tensor<R>,
    /// Forward input
    pub input: &'a Tensor<R>,
    /// Saved per-row mean, `m` elements
    pub mean: &'a Tensor<R>,
    /// Saved per-row reciprocal standard deviation, `m` elements
    pub rstd: &'a Tensor<R>,
    /// Scale used in the forward pass
    pub weight: Option<&'a Tensor<R>>,
    /// Input gradient, shaped like the input
    pub grad_input: Option<&'a mut Tensor<R>>,
    /// Scale gradient, `n` elements
    pub grad_weight: Option<&'a mut Tensor<R>>,
    /// Shift gradient, `n` elements
    pub grad_bias: Option<&'a mut Tensor<R>>,
    /// Number of rows
    pub m: usize,
    /// Elements per row
    pub n: usize,
}

/// Fused layer-norm forward entry point
pub type LayerNormForwardFn<R> =
    fn(&<R as Runtime>::Client, LayerNormForwardArgs<'_, R>) -> Result<()>;

/// Fused layer-norm backward entry point
pub type LayerNormBackwardFn<R> =
    fn(&<R as Runtime>::Client, LayerNormBackwardArgs<'_, R>) -> Result<()>;

/// Per-runtime table of fused kernels keyed by [`DeviceType`]
///
/// # Example
///
/// ```ignore
/// let mut registry = KernelRegistry::<CpuRuntime>::new();
/// registry.register_layer_norm(DeviceType::Cpu, my_forward, my_backward);
/// let client = CpuClient::new(device).with_registry(registry);
/// ```
pub struct KernelRegistry<R: Runtime> {
    layer_norm_forward: HashMap<DeviceType, LayerNormForwardFn<R>>,
    layer_norm_backward: HashMap<DeviceType, LayerNormBackwardFn<R>>,
}

impl<R: Runtime> KernelRegistry<R> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            layer_norm_forward: HashMap::new(),
            layer_norm_backward: HashMap::new(),
        }
    }

    /// Register forward and backward layer-norm kernels for a device type
    ///
    /// Replaces any kernels previously registered under `device`.
    pub fn register_layer_norm(
        &mut self,
        device: DeviceType,
        forward: LayerNormForwardFn<R>,
        backward: LayerNormBackwardFn<R>,
    ) -> &mut Self {
        self.layer_norm_forward.insert(device, forward);
        self.layer_norm_backward.insert(device, backward);
        self
    }

    /// Remove the layer-norm kernels registered for a device type
    pub fn unregister_layer_norm(&mut self, device: DeviceType) -> &mut Self {
        self.layer_norm_forward.remove(&device);
        self.layer_norm_backward.remove(&device);
        self
    }

    /// Whether a fused forward kernel exists for `device`
    pub fn has_layer_norm(&self, device: DeviceType) -> bool {
        self.layer_norm_forward.contains_key(&device)
    }

    /// Look up the forward kernel for `device`
    pub fn layer_norm_forward(&self, device: DeviceType) -> Result<LayerNormForwardFn<R>> {
        self.layer_norm_forward
            .get(&device)
            .copied()
            .ok_or(Error::KernelNotRegistered {
                op: "layer_norm",
                device,
            })
    }

    /// Look up the backward kernel for `device`
    pub fn layer_norm_backward(&self, device: DeviceType) -> Result<LayerNormBackwardFn<R>> {
        self.layer_norm_backward
            .get(&device)
            .copied()
            .ok_or(Error::KernelNotRegistered {
                op: "layer_norm_backward",
                device,
            })
    }
}

impl<R: Runtime> Default for KernelRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Runtime> Clone for KernelRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            layer_norm_forward: self.layer_norm_forward.clone(),
            layer_norm_backward: self.layer_norm_backward.clone(),
        }
    }
}

impl<R: Runtime> fmt::Debug for KernelRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("runtime", &R::name())
            .field("layer_norm_forward", &self.layer_norm_forward.keys())
            .field("layer_norm_backward", &self.layer_norm_backward.keys())
            .finish()
    }
}
