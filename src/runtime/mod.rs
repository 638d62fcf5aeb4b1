//! Runtime backends for tensor computation
//!
//! This module defines the `Runtime` trait, the kernel registry that fused
//! operations dispatch through, and the CPU backend.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, memory)
//! ├── Device (identifies a compute unit, reports its DeviceType)
//! └── Client (dispatches operations)
//!     └── KernelRegistry (DeviceType -> fused kernel entry points)
//! ```

pub mod cpu;
mod helpers;
mod registry;
mod traits;

pub use helpers::{ensure_contiguous, ensure_contiguous_opt};
pub use registry::{
    KernelRegistry, LayerNormBackwardArgs, LayerNormBackwardFn, LayerNormForwardArgs,
    LayerNormForwardFn,
};
pub use traits::{Device, DeviceType, Runtime, RuntimeClient};
