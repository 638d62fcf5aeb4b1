//! Normalization kernels
//!
//! All statistics accumulate in f64 regardless of the storage type. Row
//! reductions use the two-pass mean/variance form; the batch-norm kernel uses
//! the same order so the two forward strategies agree bit-for-bit on their
//! statistics when a batch-norm "channel" is a layer-norm row.

use super::{raw_slice, raw_slice_mut};
use crate::dtype::Element;
use crate::runtime::cpu::CpuClient;
use crate::runtime::cpu::helpers::parallel_for;

#[inline]
fn mean_and_rstd<'a, T: Element>(
    values: impl Iterator<Item = &'a T> + Clone,
    eps: f64,
) -> (f64, f64) {
    let (sum, count) = values
        .clone()
        .fold((0.0f64, 0usize), |(s, c), v| (s + v.to_f64(), c + 1));
    let count = count as f64;
    let mean = sum / count;
    let var = values.fold(0.0f64, |acc, v| {
        let d = v.to_f64() - mean;
        acc + d * d
    }) / count;
    (mean, 1.0 / (var + eps).sqrt())
}

/// Normalize one row and apply the optional affine; returns (mean, rstd).
#[inline]
fn layer_norm_row<T: Element>(
    x: &[T],
    weight: Option<&[T]>,
    bias: Option<&[T]>,
    out: &mut [T],
    eps: f64,
) -> (f64, f64) {
    let (mean, rstd) = mean_and_rstd(x.iter(), eps);

    for (j, (o, v)) in out.iter_mut().zip(x).enumerate() {
        let xhat = (v.to_f64() - mean) * rstd;
        let g = weight.map_or(1.0, |w| w[j].to_f64());
        let b = bias.map_or(0.0, |b| b[j].to_f64());
        *o = T::from_f64(xhat.mul_add(g, b));
    }

    (mean, rstd)
}

/// Input gradient of one row.
///
/// With `g = dy * gamma` and `xhat = (x - mean) * rstd`:
/// `dx = rstd / n * (n * g - sum(g) - xhat * sum(g * xhat))`
#[inline]
fn layer_norm_input_grad_row<T: Element>(
    dy: &[T],
    x: &[T],
    mean: f64,
    rstd: f64,
    weight: Option<&[T]>,
    dx: &mut [T],
) {
    let n = x.len() as f64;
    let gamma = |j: usize| weight.map_or(1.0, |w| w[j].to_f64());

    let (sum_g, sum_g_xhat) =
        dy.iter()
            .zip(x)
            .enumerate()
            .fold((0.0f64, 0.0f64), |(sg, sgx), (j, (d, v))| {
                let g = d.to_f64() * gamma(j);
                let xhat = (v.to_f64() - mean) * rstd;
                (sg + g, sgx + g * xhat)
            });

    let scale = rstd / n;
    for (j, ((o, d), v)) in dx.iter_mut().zip(dy).zip(x).enumerate() {
        let g = d.to_f64() * gamma(j);
        let xhat = (v.to_f64() - mean) * rstd;
        *o = T::from_f64(scale * (n * g - sum_g - xhat * sum_g_xhat));
    }
}

/// Layer normalization forward over `m` rows of `n` contiguous elements
///
/// Writes `out = (x - mean) * rstd * weight + bias` per row, and the row
/// statistics into `mean` and `rstd`. Rows are processed in parallel.
///
/// # Safety
/// - `input` and `out` must be valid for `m * n` elements
/// - `weight` and `bias`, when present, must be valid for `n` elements
/// - `mean` and `rstd` must be valid for `m` elements
/// - outputs must not overlap any input or each other
#[allow(clippy::too_many_arguments)]
pub unsafe fn layer_norm_forward_kernel<T: Element>(
    client: &CpuClient,
    input: *const T,
    weight: Option<*const T>,
    bias: Option<*const T>,
    out: *mut T,
    mean: *mut T,
    rstd: *mut T,
    m: usize,
    n: usize,
    eps: f64,
) {
    let input = raw_slice(input, m * n);
    let weight = weight.map(|p| raw_slice(p, n));
    let bias = bias.map(|p| raw_slice(p, n));
    let out_addr = out as usize;
    let mean_addr = mean as usize;
    let rstd_addr = rstd as usize;

    parallel_for(client, m, |row| unsafe {
        let out_row = raw_slice_mut((out_addr as *mut T).add(row * n), n);
        let x = &input[row * n..(row + 1) * n];
        let (mu, rs) = layer_norm_row(x, weight, bias, out_row, eps);
        *(mean_addr as *mut T).add(row) = T::from_f64(mu);
        *(rstd_addr as *mut T).add(row) = T::from_f64(rs);
    });
}

/// Layer normalization backward over `m` rows of `n` contiguous elements
///
/// Each requested gradient is fully overwritten:
/// - `grad_input`: per row, see `layer_norm_input_grad_row` (row-parallel)
/// - `grad_weight[j] = sum_i dy[i, j] * (x[i, j] - mean[i]) * rstd[i]`
/// - `grad_bias[j] = sum_i dy[i, j]`
///
/// The parameter reductions run column-parallel so each output element has
/// exactly one writer and the summation order is fixed.
///
/// # Safety
/// - `grad_out`, `input` and `grad_input` must be valid for `m * n` elements
/// - `mean` and `rstd` must be valid for `m` elements
/// - `weight`, `grad_weight` and `grad_bias` must be valid for `n` elements
/// - gradient outputs must not overlap any input or each other
#[allow(clippy::too_many_arguments)]
pub unsafe fn layer_norm_backward_kernel<T: Element>(
    client: &CpuClient,
    grad_out: *const T,
    input: *const T,
    mean: *const T,
    rstd: *const T,
    weight: Option<*const T>,
    grad_input: Option<*mut T>,
    grad_weight: Option<*mut T>,
    grad_bias: Option<*mut T>,
    m: usize,
    n: usize,
) {
    let dy = raw_slice(grad_out, m * n);
    let x = raw_slice(input, m * n);
    let mean = raw_slice(mean, m);
    let rstd = raw_slice(rstd, m);
    let weight = weight.map(|p| raw_slice(p, n));

    if let Some(dx) = grad_input {
        let dx_addr = dx as usize;
        parallel_for(client, m, |row| unsafe {
            let dx_row = raw_slice_mut((dx_addr as *mut T).add(row * n), n);
            let span = row * n..(row + 1) * n;
            layer_norm_input_grad_row(
                &dy[span.clone()],
                &x[span],
                mean[row].to_f64(),
                rstd[row].to_f64(),
                weight,
                dx_row,
            );
        });
    }

    if grad_weight.is_none() && grad_bias.is_none() {
        return;
    }

    let dw_addr = grad_weight.map(|p| p as usize);
    let db_addr = grad_bias.map(|p| p as usize);
    parallel_for(client, n, |col| unsafe {
        let (mut dw, mut db) = (0.0f64, 0.0f64);
        for row in 0..m {
            let idx = row * n + col;
            let g = dy[idx].to_f64();
            db += g;
            dw += g * (x[idx].to_f64() - mean[row].to_f64()) * rstd[row].to_f64();
        }
        if let Some(addr) = dw_addr {
            *(addr as *mut T).add(col) = T::from_f64(dw);
        }
        if let Some(addr) = db_addr {
            *(addr as *mut T).add(col) = T::from_f64(db);
        }
    });
}

/// Training-mode batch normalization without affine parameters
///
/// `input` is `[batch, channels, spatial]` row-major. For each channel the
/// statistics cover all `batch * spatial` elements; `out` receives
/// `(x - mean) * rstd`. Channels are processed in parallel.
///
/// # Safety
/// - `input` and `out` must be valid for `batch * channels * spatial` elements
/// - `mean` and `rstd` must be valid for `channels` elements
/// - outputs must not overlap any input or each other
#[allow(clippy::too_many_arguments)]
pub unsafe fn batch_norm_training_kernel<T: Element>(
    client: &CpuClient,
    input: *const T,
    out: *mut T,
    mean: *mut T,
    rstd: *mut T,
    batch: usize,
    channels: usize,
    spatial: usize,
    eps: f64,
) {
    let input = raw_slice(input, batch * channels * spatial);
    let out_addr = out as usize;
    let mean_addr = mean as usize;
    let rstd_addr = rstd as usize;

    parallel_for(client, channels, |c| unsafe {
        let plane = |b: usize| {
            let start = (b * channels + c) * spatial;
            start..start + spatial
        };
        let values = (0..batch).flat_map(|b| input[plane(b)].iter());
        let (mu, rs) = mean_and_rstd(values, eps);

        for b in 0..batch {
            let span = plane(b);
            let out_plane = raw_slice_mut((out_addr as *mut T).add(span.start), spatial);
            for (o, v) in out_plane.iter_mut().zip(&input[span]) {
                *o = T::from_f64((v.to_f64() - mu) * rs);
            }
        }
        *(mean_addr as *mut T).add(c) = T::from_f64(mu);
        *(rstd_addr as *mut T).add(c) = T::from_f64(rs);
    });
}
