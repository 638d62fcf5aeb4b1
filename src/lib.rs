//! # layernorm
//!
//! **Layer normalization forward and backward over a small tensor runtime.**
//!
//! layernorm normalizes the trailing dimensions of an n-dimensional tensor,
//! row by row, and computes the gradients of that normalization. Backends plug
//! their fused kernels into a per-device registry; any backend that implements
//! the batch-norm reduction and elementwise arithmetic also gets a composed
//! fallback for free.
//!
//! ## Features
//!
//! - **Fused forward**: output plus saved per-row mean and reciprocal std
//! - **Fused backward**: input, weight and bias gradients, each optional
//! - **Composed fallback**: the same forward built from batch norm and `addcmul`
//! - **Kernel registry**: device type to kernel lookup, replaceable per client
//! - **Multiple dtypes**: f64, f32, and (with `f16`) f16, bf16
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use layernorm::prelude::*;
//!
//! let device = CpuDevice::new();
//! let client = CpuRuntime::default_client(&device);
//!
//! let x = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], &device);
//! let out = client.native_layer_norm(&x, &[3], None, None, 1e-5)?;
//! // out.mean: [[2.0], [5.0]]
//!
//! let grads = client.native_layer_norm_backward(
//!     &x.clone(), &x, &[3], &out.mean, &out.rstd, None, None, GradMask::all(),
//! )?;
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): Multi-threaded CPU kernels
//! - `f16`: Half-precision floats (F16, BF16)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod dtype;
pub mod error;
pub mod ops;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::ops::{
        BatchNormOps, BinaryOps, GradMask, LayerNormGrads, LayerNormOps, LayerNormOutput,
    };
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime, ParallelismConfig};
    pub use crate::runtime::{Device, DeviceType, KernelRegistry, Runtime, RuntimeClient};
    pub use crate::tensor::{Layout, Tensor};
}

/// Default runtime
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
