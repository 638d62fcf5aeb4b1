//! CPU implementation of binary operations.

use crate::dispatch_dtype;
use crate::error::Result;
use crate::ops::{BinaryOp, BinaryOps, broadcast_shape, validate_same_dtype};
use crate::runtime::cpu::{CpuClient, CpuRuntime, kernels};
use crate::tensor::Tensor;

/// Helper for binary operations (add, sub, mul, div)
fn binary_op_impl(
    client: &CpuClient,
    op: BinaryOp,
    a: &Tensor<CpuRuntime>,
    b: &Tensor<CpuRuntime>,
) -> Result<Tensor<CpuRuntime>> {
    let dtype = a.dtype();
    validate_same_dtype(dtype, &[b.dtype()])?;
    let out_shape = broadcast_shape(a.shape(), b.shape())?;

    let out = Tensor::<CpuRuntime>::try_empty(&out_shape, dtype, &client.device)?;
    let out_ptr = out.storage().ptr();

    let same_shapes = a.shape() == b.shape() && a.shape() == out_shape.as_slice();
    if same_shapes && a.is_contiguous() && b.is_contiguous() {
        let len = a.numel();
        let a_ptr = a.storage().ptr();
        let b_ptr = b.storage().ptr();

        dispatch_dtype!(dtype, T => {
            unsafe {
                kernels::binary_op_kernel::<T>(
                    op,
                    a_ptr as *const T,
                    b_ptr as *const T,
                    out_ptr as *mut T,
                    len,
                );
            }
        }, op.name());
    } else {
        // Broadcast both inputs to the output shape (stride 0 on expanded dims)
        let a = a.broadcast_to(&out_shape)?;
        let b = b.broadcast_to(&out_shape)?;
        let a_ptr = a.storage().ptr();
        let b_ptr = b.storage().ptr();

        dispatch_dtype!(dtype, T => {
            unsafe {
                kernels::binary_op_strided_kernel::<T>(
                    op,
                    a_ptr as *const T,
                    b_ptr as *const T,
                    out_ptr as *mut T,
                    &out_shape,
                    a.strides(),
                    b.strides(),
                    a.layout().offset(),
                    b.layout().offset(),
                );
            }
        }, op.name());
    }

    Ok(out)
}

/// BinaryOps implementation for CPU runtime.
impl BinaryOps<CpuRuntime> for CpuClient {
    fn add(&self, a: &Tensor<CpuRuntime>, b: &Tensor<CpuRuntime>) -> Result<Tensor<CpuRuntime>> {
        binary_op_impl(self, BinaryOp::Add, a, b)
    }

    fn sub(&self, a: &Tensor<CpuRuntime>, b: &Tensor<CpuRuntime>) -> Result<Tensor<CpuRuntime>> {
        binary_op_impl(self, BinaryOp::Sub, a, b)
    }

    fn mul(&self, a: &Tensor<CpuRuntime>, b: &Tensor<CpuRuntime>) -> Result<Tensor<CpuRuntime>> {
        binary_op_impl(self, BinaryOp::Mul, a, b)
    }

    fn div(&self, a: &Tensor<CpuRuntime>, b: &Tensor<CpuRuntime>) -> Result<Tensor<CpuRuntime>> {
        binary_op_impl(self, BinaryOp::Div, a, b)
    }

    fn addcmul(
        &self,
        input: &Tensor<CpuRuntime>,
        tensor1: &Tensor<CpuRuntime>,
        tensor2: &Tensor<CpuRuntime>,
        value: f64,
    ) -> Result<Tensor<CpuRuntime>> {
        let dtype = input.dtype();
        validate_same_dtype(dtype, &[tensor1.dtype(), tensor2.dtype()])?;
        let out_shape = broadcast_shape(
            &broadcast_shape(input.shape(), tensor1.shape())?,
            tensor2.shape(),
        )?;

        let out = Tensor::<CpuRuntime>::try_empty(&out_shape, dtype, &self.device)?;
        let out_ptr = out.storage().ptr();

        let input = input.broadcast_to(&out_shape)?;
        let tensor1 = tensor1.broadcast_to(&out_shape)?;
        let tensor2 = tensor2.broadcast_to(&out_shape)?;
        let (input_ptr, t1_ptr, t2_ptr) = (
            input.storage().ptr(),
            tensor1.storage().ptr(),
            tensor2.storage().ptr(),
        );

        dispatch_dtype!(dtype, T => {
            unsafe {
                kernels::addcmul_strided_kernel::<T>(
                    input_ptr as *const T,
                    t1_ptr as *const T,
                    t2_ptr as *const T,
                    value,
                    out_ptr as *mut T,
                    &out_shape,
                    [input.strides(), tensor1.strides(), tensor2.strides()],
                    [
                        input.layout().offset(),
                        tensor1.layout().offset(),
                        tensor2.layout().offset(),
                    ],
                );
            }
        }, "addcmul");

        Ok(out)
    }
}
