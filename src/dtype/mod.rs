//! Data type system for layernorm tensors
//!
//! Tensors carry their element type at runtime as a [`DType`]. Kernels recover
//! the concrete Rust type through the [`Element`] trait and the
//! `dispatch_dtype!` macro. Only floating-point element types exist: layer
//! normalization is undefined over integers.

mod element;

pub use element::Element;

use std::fmt;

/// Data types supported by layernorm tensors
///
/// F16 and BF16 are always nameable so that a tensor's dtype can be reported
/// in errors, but kernels for them are only compiled with the `f16` feature.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DType {
    /// 64-bit IEEE 754 float
    F64,
    /// 32-bit IEEE 754 float
    F32,
    /// 16-bit IEEE 754 half precision (requires "f16" feature for kernels)
    F16,
    /// 16-bit brain float (requires "f16" feature for kernels)
    BF16,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 => 8,
            Self::F32 => 4,
            Self::F16 | Self::BF16 => 2,
        }
    }

    /// Get the default dtype for floating point operations
    #[inline]
    pub const fn default_float() -> Self {
        Self::F32
    }

    /// Short name for display (e.g., "f32", "bf16")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
        }
    }
}

impl Default for DType {
    fn default() -> Self {
        Self::default_float()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
