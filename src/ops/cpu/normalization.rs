//! CPU implementation of normalization operations.

use crate::dispatch_dtype;
use crate::error::{Error, Result};
use crate::ops::impl_generic::{
    layer_norm_impl, math_layer_norm_impl, native_layer_norm_backward_impl, native_layer_norm_impl,
    native_layer_norm_out_impl,
};
use crate::ops::{
    BatchNormOps, BatchNormOutput, GradMask, LayerNormGrads, LayerNormOps, LayerNormOutput,
};
use crate::runtime::cpu::{CpuClient, CpuRuntime, kernels};
use crate::runtime::ensure_contiguous;
use crate::tensor::Tensor;

/// LayerNormOps implementation for CPU runtime.
impl LayerNormOps<CpuRuntime> for CpuClient {
    fn native_layer_norm(
        &self,
        input: &Tensor<CpuRuntime>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<CpuRuntime>>,
        bias: Option<&Tensor<CpuRuntime>>,
        eps: f64,
    ) -> Result<LayerNormOutput<CpuRuntime>> {
        native_layer_norm_impl::<CpuRuntime>(self, input, normalized_shape, weight, bias, eps)
    }

    fn native_layer_norm_out(
        &self,
        input: &Tensor<CpuRuntime>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<CpuRuntime>>,
        bias: Option<&Tensor<CpuRuntime>>,
        eps: f64,
        out: &mut Tensor<CpuRuntime>,
    ) -> Result<()> {
        native_layer_norm_out_impl::<CpuRuntime>(
            self,
            input,
            normalized_shape,
            weight,
            bias,
            eps,
            out,
        )
    }

    fn math_layer_norm(
        &self,
        input: &Tensor<CpuRuntime>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<CpuRuntime>>,
        bias: Option<&Tensor<CpuRuntime>>,
        eps: f64,
    ) -> Result<LayerNormOutput<CpuRuntime>> {
        math_layer_norm_impl(self, input, normalized_shape, weight, bias, eps)
    }

    fn layer_norm(
        &self,
        input: &Tensor<CpuRuntime>,
        normalized_shape: &[usize],
        weight: Option<&Tensor<CpuRuntime>>,
        bias: Option<&Tensor<CpuRuntime>>,
        eps: f64,
    ) -> Result<Tensor<CpuRuntime>> {
        layer_norm_impl(self, input, normalized_shape, weight, bias, eps)
    }

    fn native_layer_norm_backward(
        &self,
        grad_out: &Tensor<CpuRuntime>,
        input: &Tensor<CpuRuntime>,
        normalized_shape: &[usize],
        mean: &Tensor<CpuRuntime>,
        rstd: &Tensor<CpuRuntime>,
        weight: Option<&Tensor<CpuRuntime>>,
        bias: Option<&Tensor<CpuRuntime>>,
        mask: GradMask,
    ) -> Result<LayerNormGrads<CpuRuntime>> {
        native_layer_norm_backward_impl::<CpuRuntime>(
            self,
            grad_out,
            input,
            normalized_shape,
            mean,
            rstd,
            weight,
            bias,
            mask,
        )
    }
}

/// BatchNormOps implementation for CPU runtime.
impl BatchNormOps<CpuRuntime> for CpuClient {
    fn batch_norm_training(
        &self,
        input: &Tensor<CpuRuntime>,
        eps: f64,
    ) -> Result<BatchNormOutput<CpuRuntime>> {
        let shape = input.shape();
        if shape.len() < 2 {
            return Err(Error::invalid_argument(
                "input",
                format!("batch_norm expects at least 2 dimensions [B, C, *], got {shape:?}"),
            ));
        }

        let dtype = input.dtype();
        let batch = shape[0];
        let channels = shape[1];
        let spatial: usize = shape[2..].iter().product();

        let input = ensure_contiguous(input)?;
        let out = Tensor::<CpuRuntime>::try_empty(shape, dtype, &self.device)?;
        let mean = Tensor::<CpuRuntime>::try_empty(&[channels], dtype, &self.device)?;
        let rstd = Tensor::<CpuRuntime>::try_empty(&[channels], dtype, &self.device)?;

        if channels > 0 {
            let input_ptr = input.storage().ptr();
            let out_ptr = out.storage().ptr();
            let mean_ptr = mean.storage().ptr();
            let rstd_ptr = rstd.storage().ptr();

            dispatch_dtype!(dtype, T => {
                unsafe {
                    kernels::batch_norm_training_kernel::<T>(
                        self,
                        input_ptr as *const T,
                        out_ptr as *mut T,
                        mean_ptr as *mut T,
                        rstd_ptr as *mut T,
                        batch,
                        channels,
                        spatial,
                        eps,
                    );
                }
            }, "batch_norm_training");
        }

        Ok(BatchNormOutput {
            output: out,
            mean,
            rstd,
        })
    }
}
