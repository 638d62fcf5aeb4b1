//! CPU implementation of tensor operations.
//!
//! This module contains the operation trait implementations for the CPU runtime.
//! Each operation type has its own module.

mod binary;
mod normalization;
