//! Generic implementations of composite operations.
//!
//! This module contains backend-agnostic implementations shared by every
//! backend. Each backend's trait impl is a thin wrapper that delegates here,
//! so validation and statistics handling are identical everywhere and only
//! the kernels differ.
//!
//! # Architecture
//!
//! ```text
//! impl_generic/layer_norm.rs
//!     ├── native_layer_norm_impl<R>()          ──► KernelRegistry ──► fused kernel
//!     ├── native_layer_norm_backward_impl<R>() ──► KernelRegistry ──► fused kernel
//!     └── math_layer_norm_impl<R, C>()         ──► BatchNormOps + BinaryOps
//!             │
//!             └── cpu/normalization.rs delegates here
//! ```

pub mod layer_norm;

pub use layer_norm::{
    layer_norm_impl, math_layer_norm_impl, native_layer_norm_backward_impl, native_layer_norm_impl,
    native_layer_norm_out_impl,
};
