//! CPU kernel implementations
//!
//! Low-level compute kernels over raw pointers. Kernels are generic over
//! `T: Element`; callers select `T` with `dispatch_dtype!`.

#![allow(unsafe_op_in_unsafe_fn)] // Kernels are already marked unsafe, inner unsafe is redundant

pub mod binary;
pub mod norm;

pub use binary::{addcmul_strided_kernel, binary_op_kernel, binary_op_strided_kernel};
pub use norm::{batch_norm_training_kernel, layer_norm_backward_kernel, layer_norm_forward_kernel};

/// Borrow `len` elements at `ptr`; zero-length views never touch the pointer.
///
/// # Safety
/// `ptr` must be valid for reads of `len` elements for the chosen lifetime.
#[inline]
pub(crate) unsafe fn raw_slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

/// Mutably borrow `len` elements at `ptr`; zero-length views never touch the pointer.
///
/// # Safety
/// `ptr` must be valid for writes of `len` elements and not aliased for the
/// chosen lifetime.
#[inline]
pub(crate) unsafe fn raw_slice_mut<'a, T>(ptr: *mut T, len: usize) -> &'a mut [T] {
    if len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(ptr, len)
    }
}
