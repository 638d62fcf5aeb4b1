//! Elementwise binary and fused multiply-add kernels

use crate::dtype::Element;
use crate::ops::BinaryOp;

#[inline]
fn apply<T: Element>(op: BinaryOp, x: T, y: T) -> T {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
    }
}

/// Visit every index of `shape` in row-major order, tracking one element
/// offset per operand. Offsets advance incrementally (no per-element
/// recomputation from indices); a stride of 0 pins an operand along that dim.
#[inline]
fn for_each_strided<const K: usize>(
    shape: &[usize],
    strides: [&[isize]; K],
    offsets: [usize; K],
    mut f: impl FnMut(usize, [isize; K]),
) {
    let total: usize = shape.iter().product();
    if total == 0 {
        return;
    }

    let ndim = shape.len();
    let mut indices = vec![0usize; ndim];
    let mut pos = offsets.map(|o| o as isize);

    for out_idx in 0..total {
        f(out_idx, pos);

        for dim in (0..ndim).rev() {
            indices[dim] += 1;
            for k in 0..K {
                pos[k] += strides[k][dim];
            }
            if indices[dim] < shape[dim] {
                break;
            }
            for k in 0..K {
                pos[k] -= strides[k][dim] * shape[dim] as isize;
            }
            indices[dim] = 0;
        }
    }
}

/// Execute a binary operation element-wise on contiguous buffers
///
/// # Safety
/// - `a`, `b`, and `out` must be valid pointers to `len` elements
/// - `out` must not overlap with `a` or `b`
#[inline]
pub unsafe fn binary_op_kernel<T: Element>(
    op: BinaryOp,
    a: *const T,
    b: *const T,
    out: *mut T,
    len: usize,
) {
    let a = super::raw_slice(a, len);
    let b = super::raw_slice(b, len);
    let out = super::raw_slice_mut(out, len);

    for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *o = apply(op, x, y);
    }
}

/// Execute a binary operation with broadcasting via strides
///
/// Stride of 0 means the dimension is broadcast (all indices access the
/// same element). `out` is written contiguously in `out_shape` order.
///
/// # Safety
/// - All pointers must be valid for the specified shapes, strides and offsets
/// - `out` must not overlap with `a` or `b`
#[inline]
#[allow(clippy::too_many_arguments)]
pub unsafe fn binary_op_strided_kernel<T: Element>(
    op: BinaryOp,
    a: *const T,
    b: *const T,
    out: *mut T,
    out_shape: &[usize],
    a_strides: &[isize],
    b_strides: &[isize],
    a_offset: usize,
    b_offset: usize,
) {
    for_each_strided(
        out_shape,
        [a_strides, b_strides],
        [a_offset, b_offset],
        |i, [ai, bi]| unsafe {
            *out.add(i) = apply(op, *a.offset(ai), *b.offset(bi));
        },
    );
}

/// `out = input + value * t1 * t2` with broadcasting via strides
///
/// The product and sum are computed in f64 as one fused multiply-add, so the
/// only rounding to `T` happens on the final store.
///
/// # Safety
/// - All pointers must be valid for the specified shapes, strides and offsets
/// - `out` must not overlap with any input
#[allow(clippy::too_many_arguments)]
pub unsafe fn addcmul_strided_kernel<T: Element>(
    input: *const T,
    t1: *const T,
    t2: *const T,
    value: f64,
    out: *mut T,
    out_shape: &[usize],
    strides: [&[isize]; 3],
    offsets: [usize; 3],
) {
    for_each_strided(out_shape, strides, offsets, |i, [ii, ai, bi]| unsafe {
        let base = (*input.offset(ii)).to_f64();
        let x = (*t1.offset(ai)).to_f64() * value;
        let y = (*t2.offset(bi)).to_f64();
        *out.add(i) = T::from_f64(x.mul_add(y, base));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_kernel() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [4.0f32, 5.0, 6.0];
        let mut out = [0.0f32; 3];
        unsafe { binary_op_kernel(BinaryOp::Mul, a.as_ptr(), b.as_ptr(), out.as_mut_ptr(), 3) };
        assert_eq!(out, [4.0, 10.0, 18.0]);
    }

    #[test]
    fn test_strided_kernel_broadcasts_row() {
        // [2, 3] + [3] broadcast along rows
        let a = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [10.0f64, 20.0, 30.0];
        let mut out = [0.0f64; 6];
        unsafe {
            binary_op_strided_kernel(
                BinaryOp::Add,
                a.as_ptr(),
                b.as_ptr(),
                out.as_mut_ptr(),
                &[2, 3],
                &[3, 1],
                &[0, 1],
                0,
                0,
            );
        }
        assert_eq!(out, [11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
    }

    #[test]
    fn test_addcmul_strided_kernel() {
        let input = [1.0f64, 1.0];
        let t1 = [2.0f64, 3.0, 4.0, 5.0];
        let t2 = [10.0f64, 100.0];
        let mut out = [0.0f64; 4];
        unsafe {
            addcmul_strided_kernel(
                input.as_ptr(),
                t1.as_ptr(),
                t2.as_ptr(),
                0.5,
                out.as_mut_ptr(),
                &[2, 2],
                [&[0, 1], &[2, 1], &[0, 1]],
                [0, 0, 0],
            );
        }
        assert_eq!(out, [11.0, 151.0, 21.0, 251.0]);
    }
}
