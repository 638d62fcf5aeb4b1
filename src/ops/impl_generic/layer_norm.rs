//! Backend-agnostic layer-norm orchestration
//!
//! Validation, allocation and statistics reshaping live here. The arithmetic
//! is either delegated to the fused kernel registered for the operand device
//! or, for [`math_layer_norm_impl`], composed from [`BatchNormOps`] and
//! [`BinaryOps`].

use crate::error::{Error, Result};
use crate::ops::layer_norm_common::{
    LayerNormDims, resolve_layer_norm_shape, validate_layer_norm_dtypes, validate_no_alias,
};
use crate::ops::{
    BatchNormOps, BatchNormOutput, BinaryOps, GradMask, LayerNormGrads, LayerNormOutput,
};
use crate::runtime::{
    Device, LayerNormBackwardArgs, LayerNormForwardArgs, Runtime, RuntimeClient, ensure_contiguous,
    ensure_contiguous_opt,
};
use crate::tensor::Tensor;

fn resolve<R: Runtime>(
    input: &Tensor<R>,
    normalized_shape: &[usize],
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
) -> Result<LayerNormDims> {
    let dims = resolve_layer_norm_shape(
        input.shape(),
        normalized_shape,
        weight.map(|w| w.shape()),
        bias.map(|b| b.shape()),
    )?;
    validate_layer_norm_dtypes(input, &[weight, bias])?;
    Ok(dims)
}

/// Run the registered forward kernel into preallocated buffers
#[allow(clippy::too_many_arguments)]
fn run_forward<R: Runtime>(
    client: &R::Client,
    input: &Tensor<R>,
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
    eps: f64,
    dims: LayerNormDims,
    output: &mut Tensor<R>,
    mean: &mut Tensor<R>,
    rstd: &mut Tensor<R>,
) -> Result<()> {
    if dims.m == 0 {
        log::debug!("layer_norm: empty batch, skipping kernel");
        return Ok(());
    }

    let kernel = client
        .kernel_registry()
        .layer_norm_forward(input.device().device_type())?;

    let input = ensure_contiguous(input)?;
    let weight = ensure_contiguous_opt(weight)?;
    let bias = ensure_contiguous_opt(bias)?;

    kernel(
        client,
        LayerNormForwardArgs {
            input: &input,
            weight: weight.as_deref(),
            bias: bias.as_deref(),
            output,
            mean,
            rstd,
            m: dims.m,
            n: dims.n,
            eps,
        },
    )
}

/// Fused forward returning output and statistics
pub fn native_layer_norm_impl<R: Runtime>(
    client: &R::Client,
    input: &Tensor<R>,
    normalized_shape: &[usize],
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
    eps: f64,
) -> Result<LayerNormOutput<R>> {
    let dims = resolve(input, normalized_shape, weight, bias)?;
    let dtype = input.dtype();
    let device = input.device();

    let mut output = input.try_empty_like()?;
    let mut mean = Tensor::<R>::try_empty(&[dims.m], dtype, device)?;
    let mut rstd = Tensor::<R>::try_empty(&[dims.m], dtype, device)?;

    run_forward(
        client,
        input,
        weight,
        bias,
        eps,
        dims,
        &mut output,
        &mut mean,
        &mut rstd,
    )?;

    let stat_shape = dims.stat_shape(input.shape());
    Ok(LayerNormOutput {
        output,
        mean: mean.view(&stat_shape)?,
        rstd: rstd.view(&stat_shape)?,
    })
}

/// Fused forward into a caller-provided output buffer
pub fn native_layer_norm_out_impl<R: Runtime>(
    client: &R::Client,
    input: &Tensor<R>,
    normalized_shape: &[usize],
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
    eps: f64,
    out: &mut Tensor<R>,
) -> Result<()> {
    let dims = resolve(input, normalized_shape, weight, bias)?;

    if out.shape() != input.shape() {
        return Err(Error::shape_mismatch(input.shape(), out.shape()));
    }
    validate_layer_norm_dtypes(input, &[Some(&*out)])?;
    if !out.is_contiguous() {
        return Err(Error::NotContiguous);
    }
    validate_no_alias(out, &[Some(input), weight, bias])?;

    let dtype = input.dtype();
    let device = input.device();
    let mut mean = Tensor::<R>::try_empty(&[dims.m], dtype, device)?;
    let mut rstd = Tensor::<R>::try_empty(&[dims.m], dtype, device)?;

    run_forward(
        client, input, weight, bias, eps, dims, out, &mut mean, &mut rstd,
    )
}

/// Layer norm composed from a batch-norm reduction and elementwise affine ops
///
/// The input is viewed as `[1, M, N]` so that batch norm's per-channel
/// statistics become per-row statistics. The affine step uses a fused
/// multiply-add when both parameters are present.
pub fn math_layer_norm_impl<R, C>(
    client: &C,
    input: &Tensor<R>,
    normalized_shape: &[usize],
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
    eps: f64,
) -> Result<LayerNormOutput<R>>
where
    R: Runtime,
    C: BatchNormOps<R> + BinaryOps<R>,
{
    let dims = resolve(input, normalized_shape, weight, bias)?;

    let input = ensure_contiguous(input)?;
    let grouped = input.view(&[1, dims.m, dims.n])?;
    let BatchNormOutput { output, mean, rstd } = client.batch_norm_training(&grouped, eps)?;
    let normalized = output.view(input.shape())?;

    let output = match (weight, bias) {
        (Some(w), Some(b)) => client.addcmul(b, &normalized, w, 1.0)?,
        (Some(w), None) => client.mul(&normalized, w)?,
        (None, Some(b)) => client.add(&normalized, b)?,
        (None, None) => normalized,
    };

    let stat_shape = dims.stat_shape(input.shape());
    Ok(LayerNormOutput {
        output,
        mean: mean.view(&stat_shape)?,
        rstd: rstd.view(&stat_shape)?,
    })
}

/// Forward output only, fused when a kernel is registered, composed otherwise
pub fn layer_norm_impl<R, C>(
    client: &C,
    input: &Tensor<R>,
    normalized_shape: &[usize],
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
    eps: f64,
) -> Result<Tensor<R>>
where
    R: Runtime<Client = C>,
    C: RuntimeClient<R> + BatchNormOps<R> + BinaryOps<R>,
{
    let device_type = input.device().device_type();
    let out = if client.kernel_registry().has_layer_norm(device_type) {
        native_layer_norm_impl::<R>(client, input, normalized_shape, weight, bias, eps)?
    } else {
        log::debug!("layer_norm: no fused kernel for {device_type:?}, using composed fallback");
        math_layer_norm_impl(client, input, normalized_shape, weight, bias, eps)?
    };
    Ok(out.output)
}

/// Allocate a requested parameter gradient
///
/// Zero-filled when there are no rows, since the kernel will not run.
fn param_grad<R: Runtime>(
    param: Option<&Tensor<R>>,
    wanted: bool,
    m: usize,
) -> Result<Option<Tensor<R>>> {
    match param {
        Some(p) if wanted => {
            let grad = if m > 0 {
                p.try_empty_like()?
            } else {
                p.try_zeros_like()?
            };
            Ok(Some(grad))
        }
        _ => Ok(None),
    }
}

/// Fused backward producing the gradients selected by `mask`
#[allow(clippy::too_many_arguments)]
pub fn native_layer_norm_backward_impl<R: Runtime>(
    client: &R::Client,
    grad_out: &Tensor<R>,
    input: &Tensor<R>,
    normalized_shape: &[usize],
    mean: &Tensor<R>,
    rstd: &Tensor<R>,
    weight: Option<&Tensor<R>>,
    bias: Option<&Tensor<R>>,
    mask: GradMask,
) -> Result<LayerNormGrads<R>> {
    let dims = resolve(input, normalized_shape, weight, bias)?;

    if grad_out.shape() != input.shape() {
        return Err(Error::shape_mismatch(input.shape(), grad_out.shape()));
    }
    for stat in [mean, rstd] {
        if stat.numel() != dims.m {
            return Err(Error::shape_mismatch(
                &dims.stat_shape(input.shape()),
                stat.shape(),
            ));
        }
    }
    validate_layer_norm_dtypes(input, &[Some(grad_out), Some(mean), Some(rstd)])?;

    let mut grad_input = if mask.input {
        Some(input.try_empty_like()?)
    } else {
        None
    };
    let mut grad_weight = param_grad(weight, mask.weight, dims.m)?;
    let mut grad_bias = param_grad(bias, mask.bias, dims.m)?;

    let requested = grad_input.is_some() || grad_weight.is_some() || grad_bias.is_some();
    if dims.m == 0 || !requested {
        log::debug!(
            "layer_norm_backward: skipping kernel (m={}, requested={requested})",
            dims.m
        );
        return Ok(LayerNormGrads {
            grad_input,
            grad_weight,
            grad_bias,
        });
    }

    let kernel = client
        .kernel_registry()
        .layer_norm_backward(input.device().device_type())?;

    let grad_out = ensure_contiguous(grad_out)?;
    let input = ensure_contiguous(input)?;
    let mean = ensure_contiguous(mean)?;
    let rstd = ensure_contiguous(rstd)?;
    let weight = ensure_contiguous_opt(weight)?;

    kernel(
        client,
        LayerNormBackwardArgs {
            grad_out: &grad_out,
            input: &input,
            mean: &mean,
            rstd: &rstd,
            weight: weight.as_deref(),
            grad_input: grad_input.as_mut(),
            grad_weight: grad_weight.as_mut(),
            grad_bias: grad_bias.as_mut(),
            m: dims.m,
            n: dims.n,
        },
    )?;

    Ok(LayerNormGrads {
        grad_input,
        grad_weight,
        grad_bias,
    })
}
