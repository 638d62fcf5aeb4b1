//! CPU kernel registry and fused kernel entry points

use super::{CpuClient, CpuRuntime, kernels};
use crate::dispatch_dtype;
use crate::error::{Error, Result};
use crate::runtime::{DeviceType, KernelRegistry, LayerNormBackwardArgs, LayerNormForwardArgs};
use crate::tensor::Tensor;
use std::sync::{Arc, OnceLock};

static CPU_REGISTRY: OnceLock<Arc<KernelRegistry<CpuRuntime>>> = OnceLock::new();

/// Process-wide registry holding the built-in CPU kernels
///
/// Built on first use and shared by every [`CpuClient`] created with
/// [`CpuClient::new`].
pub fn default_registry() -> Arc<KernelRegistry<CpuRuntime>> {
    CPU_REGISTRY
        .get_or_init(|| {
            log::debug!("cpu: building kernel registry");
            let mut registry = KernelRegistry::new();
            registry.register_layer_norm(
                DeviceType::Cpu,
                cpu_layer_norm_forward,
                cpu_layer_norm_backward,
            );
            Arc::new(registry)
        })
        .clone()
}

fn check_operand(
    tensor: &Tensor<CpuRuntime>,
    numel: usize,
    dtype: crate::dtype::DType,
) -> Result<()> {
    if !tensor.is_contiguous() {
        return Err(Error::NotContiguous);
    }
    if tensor.dtype() != dtype {
        return Err(Error::DTypeMismatch {
            lhs: dtype,
            rhs: tensor.dtype(),
        });
    }
    if tensor.numel() != numel {
        return Err(Error::shape_mismatch(&[numel], &[tensor.numel()]));
    }
    Ok(())
}

/// Built-in CPU layer-norm forward kernel
///
/// Rejects operand bundles whose sizes, dtypes or layouts disagree with
/// `m`/`n` before touching any memory.
pub fn cpu_layer_norm_forward(
    client: &CpuClient,
    args: LayerNormForwardArgs<'_, CpuRuntime>,
) -> Result<()> {
    let LayerNormForwardArgs {
        input,
        weight,
        bias,
        output,
        mean,
        rstd,
        m,
        n,
        eps,
    } = args;
    let dtype = input.dtype();

    check_operand(input, m * n, dtype)?;
    check_operand(output, m * n, dtype)?;
    check_operand(mean, m, dtype)?;
    check_operand(rstd, m, dtype)?;
    for param in weight.into_iter().chain(bias) {
        check_operand(param, n, dtype)?;
    }

    log::trace!("cpu: layer_norm forward m={m} n={n} dtype={dtype}");

    let input_ptr = input.storage().ptr();
    let weight_ptr = weight.map(|w| w.storage().ptr());
    let bias_ptr = bias.map(|b| b.storage().ptr());
    let out_ptr = output.storage().ptr();
    let mean_ptr = mean.storage().ptr();
    let rstd_ptr = rstd.storage().ptr();

    dispatch_dtype!(dtype, T => {
        unsafe {
            kernels::layer_norm_forward_kernel::<T>(
                client,
                input_ptr as *const T,
                weight_ptr.map(|p| p as *const T),
                bias_ptr.map(|p| p as *const T),
                out_ptr as *mut T,
                mean_ptr as *mut T,
                rstd_ptr as *mut T,
                m,
                n,
                eps,
            );
        }
    }, "layer_norm");

    Ok(())
}

/// Built-in CPU layer-norm backward kernel
pub fn cpu_layer_norm_backward(
    client: &CpuClient,
    args: LayerNormBackwardArgs<'_, CpuRuntime>,
) -> Result<()> {
    let LayerNormBackwardArgs {
        grad_out,
        input,
        mean,
        rstd,
        weight,
        grad_input,
        grad_weight,
        grad_bias,
        m,
        n,
    } = args;
    let dtype = input.dtype();

    check_operand(input, m * n, dtype)?;
    check_operand(grad_out, m * n, dtype)?;
    check_operand(mean, m, dtype)?;
    check_operand(rstd, m, dtype)?;
    if let Some(w) = weight {
        check_operand(w, n, dtype)?;
    }
    if let Some(dx) = grad_input.as_deref() {
        check_operand(dx, m * n, dtype)?;
    }
    for grad in [grad_weight.as_deref(), grad_bias.as_deref()]
        .into_iter()
        .flatten()
    {
        check_operand(grad, n, dtype)?;
    }

    log::trace!(
        "cpu: layer_norm backward m={m} n={n} dtype={dtype} dx={} dw={} db={}",
        grad_input.is_some(),
        grad_weight.is_some(),
        grad_bias.is_some()
    );

    let grad_out_ptr = grad_out.storage().ptr();
    let input_ptr = input.storage().ptr();
    let mean_ptr = mean.storage().ptr();
    let rstd_ptr = rstd.storage().ptr();
    let weight_ptr = weight.map(|w| w.storage().ptr());
    let dx_ptr = grad_input.map(|t| t.storage().ptr());
    let dw_ptr = grad_weight.map(|t| t.storage().ptr());
    let db_ptr = grad_bias.map(|t| t.storage().ptr());

    dispatch_dtype!(dtype, T => {
        unsafe {
            kernels::layer_norm_backward_kernel::<T>(
                client,
                grad_out_ptr as *const T,
                input_ptr as *const T,
                mean_ptr as *const T,
                rstd_ptr as *const T,
                weight_ptr.map(|p| p as *const T),
                dx_ptr.map(|p| p as *mut T),
                dw_ptr.map(|p| p as *mut T),
                db_ptr.map(|p| p as *mut T),
                m,
                n,
            );
        }
    }, "layer_norm_backward");

    Ok(())
}
