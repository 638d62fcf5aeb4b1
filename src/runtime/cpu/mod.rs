//! CPU runtime implementation
//!
//! The CPU runtime uses 64-byte aligned heap allocation and provides the
//! reference implementation of every operation.
//!
//! # Parallelism
//!
//! With the `rayon` feature (default), normalization kernels split their
//! independent rows across a rayon pool; see [`ParallelismConfig`].
//!
//! # Broadcasting
//!
//! Elementwise operations broadcast NumPy-style: shapes are right-aligned
//! and expanded where one operand has size 1, via stride-0 views.

mod client;
mod device;
pub(crate) mod helpers;
pub(crate) mod kernels;
mod registry;
mod runtime;

pub use crate::tensor::Tensor;
pub use client::{CpuClient, DEFAULT_MIN_LEN, ParallelismConfig};
pub use device::CpuDevice;
pub use registry::{cpu_layer_norm_backward, cpu_layer_norm_forward, default_registry};
pub use runtime::CpuRuntime;
