//! Tensor types
//!
//! This module provides the core `Tensor` type, an n-dimensional array stored
//! on a compute device, together with its `Layout` and shared `Storage`.

mod core;
mod layout;
mod storage;

pub use core::Tensor;
pub use layout::{Layout, Shape, Strides, broadcast_shapes};
pub use storage::Storage;
