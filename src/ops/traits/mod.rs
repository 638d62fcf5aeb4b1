//! Operation traits for tensor operations.
//!
//! This module contains trait definitions for the supported operations.
//! Implementations are in the backend-specific modules (cpu/).

mod binary;
mod normalization;

pub use binary::BinaryOps;
pub use normalization::{
    BatchNormOps, BatchNormOutput, GradMask, LayerNormGrads, LayerNormOps, LayerNormOutput,
};
