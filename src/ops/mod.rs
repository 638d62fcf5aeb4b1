//! Tensor operations
//!
//! This module defines the layer-normalization operations, the batch-norm
//! reduction and elementwise arithmetic they are composed from, and their
//! CPU implementations.
//!
//! # Design
//!
//! Operations are defined as traits that are implemented by `RuntimeClient`.
//! This gives operations access to the device, the allocator and the kernel
//! registry when creating output tensors.
//!
//! ```text
//! RuntimeClient<R>
//!   ├── LayerNormOps<R>
//!   │     ├── native_layer_norm, native_layer_norm_out  (fused forward)
//!   │     ├── native_layer_norm_backward                (fused backward)
//!   │     ├── math_layer_norm                           (composed forward)
//!   │     └── layer_norm                                (fused or composed)
//!   ├── BatchNormOps<R>
//!   │     └── batch_norm_training
//!   └── BinaryOps<R>
//!         └── add, sub, mul, div, addcmul
//! ```
//!
//! # Implementing Operations for a New Backend
//!
//! 1. Implement [`BinaryOps`] and [`BatchNormOps`] for the backend's client.
//!    This alone makes [`LayerNormOps::math_layer_norm`] and
//!    [`LayerNormOps::layer_norm`] available through
//!    [`impl_generic`](impl_generic::math_layer_norm_impl).
//! 2. Register fused kernels in the client's
//!    [`KernelRegistry`](crate::runtime::KernelRegistry) under the backend's
//!    [`DeviceType`](crate::runtime::DeviceType) to enable the `native_*`
//!    operations.
//!
//! # Validation helpers
//!
//! - [`resolve_layer_norm_shape`] - split an input into rows of the normalized size
//! - [`broadcast_shape`] - compute broadcast shape for binary ops

mod arithmetic;
mod cpu;
pub mod impl_generic;
mod layer_norm_common;
pub mod traits;

pub use arithmetic::*;
pub use layer_norm_common::{
    LayerNormDims, resolve_layer_norm_shape, validate_layer_norm_dtypes, validate_no_alias,
};
pub use traits::*;
