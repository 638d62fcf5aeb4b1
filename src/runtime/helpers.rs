//! Shared helper functions for runtime backends

use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;
use std::borrow::Cow;

/// Borrow a tensor if it is already contiguous, otherwise materialize a copy.
///
/// Kernels address their operands as dense row-major buffers. The returned
/// `Cow` is `Borrowed` for contiguous tensors (no copy, no refcount traffic)
/// and `Owned` when the strided view had to be copied. An owned copy lives
/// only as long as the `Cow`, so it is released when the calling operation
/// returns.
///
/// # Example
///
/// ```ignore
/// use layernorm::runtime::ensure_contiguous;
///
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);
/// let b = a.transpose(0, 1)?; // Not contiguous after transpose
/// let c = ensure_contiguous(&b)?; // Owned contiguous copy
/// assert!(c.is_contiguous());
/// ```
#[inline]
pub fn ensure_contiguous<R: Runtime>(tensor: &Tensor<R>) -> Result<Cow<'_, Tensor<R>>> {
    if tensor.is_contiguous() {
        Ok(Cow::Borrowed(tensor))
    } else {
        Ok(Cow::Owned(tensor.try_contiguous()?))
    }
}

/// [`ensure_contiguous`] lifted over an optional tensor.
#[inline]
pub fn ensure_contiguous_opt<R: Runtime>(
    tensor: Option<&Tensor<R>>,
) -> Result<Option<Cow<'_, Tensor<R>>>> {
    tensor.map(ensure_contiguous).transpose()
}
