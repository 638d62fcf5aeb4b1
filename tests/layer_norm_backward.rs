//! Integration tests for the fused layer-norm backward pass

mod common;

use common::{assert_allclose_f64, create_cpu_client, random_tensor_f64, test_values};
use layernorm::dtype::DType;
use layernorm::error::{Error, Result};
use layernorm::ops::{GradMask, LayerNormOps};
use layernorm::runtime::cpu::{
    CpuClient, CpuDevice, CpuRuntime, cpu_layer_norm_backward, cpu_layer_norm_forward,
};
use layernorm::runtime::{DeviceType, KernelRegistry, LayerNormBackwardArgs, LayerNormBackwardFn};
use layernorm::tensor::Tensor;
use std::sync::atomic::{AtomicUsize, Ordering};

// Tests run concurrently, so each counting kernel has its own counter
static MASK_CALLS: AtomicUsize = AtomicUsize::new(0);
static EMPTY_BATCH_CALLS: AtomicUsize = AtomicUsize::new(0);

fn mask_backward(client: &CpuClient, args: LayerNormBackwardArgs<'_, CpuRuntime>) -> Result<()> {
    MASK_CALLS.fetch_add(1, Ordering::SeqCst);
    cpu_layer_norm_backward(client, args)
}

fn empty_batch_backward(
    client: &CpuClient,
    args: LayerNormBackwardArgs<'_, CpuRuntime>,
) -> Result<()> {
    EMPTY_BATCH_CALLS.fetch_add(1, Ordering::SeqCst);
    cpu_layer_norm_backward(client, args)
}

fn counting_client(device: &CpuDevice, backward: LayerNormBackwardFn<CpuRuntime>) -> CpuClient {
    let mut registry = KernelRegistry::new();
    registry.register_layer_norm(DeviceType::Cpu, cpu_layer_norm_forward, backward);
    CpuClient::new(device.clone()).with_registry(registry)
}

/// sum(layer_norm(x) * g), evaluated through the fused forward
fn weighted_loss(
    client: &CpuClient,
    x: &[f64],
    w: &[f64],
    b: &[f64],
    g: &[f64],
    shape: &[usize],
    device: &CpuDevice,
) -> f64 {
    let n = *shape.last().unwrap();
    let x = Tensor::<CpuRuntime>::from_slice(x, shape, device);
    let w = Tensor::<CpuRuntime>::from_slice(w, &[n], device);
    let b = Tensor::<CpuRuntime>::from_slice(b, &[n], device);
    let out = client
        .native_layer_norm(&x, &[n], Some(&w), Some(&b), 1e-5)
        .unwrap();
    out.output
        .to_vec::<f64>()
        .iter()
        .zip(g)
        .map(|(y, g)| y * g)
        .sum()
}

/// Central finite difference of `weighted_loss` with respect to `params[which]`
fn numeric_grad(
    client: &CpuClient,
    params: [&[f64]; 3],
    which: usize,
    g: &[f64],
    shape: &[usize],
    device: &CpuDevice,
) -> Vec<f64> {
    let h = 1e-6;
    (0..params[which].len())
        .map(|i| {
            let mut plus: [Vec<f64>; 3] = params.map(|p| p.to_vec());
            let mut minus = plus.clone();
            plus[which][i] += h;
            minus[which][i] -= h;
            let lp = weighted_loss(client, &plus[0], &plus[1], &plus[2], g, shape, device);
            let lm = weighted_loss(client, &minus[0], &minus[1], &minus[2], g, shape, device);
            (lp - lm) / (2.0 * h)
        })
        .collect()
}

#[test]
fn test_backward_matches_finite_differences() {
    let (client, device) = create_cpu_client();
    let shape = [3, 5];
    let x = test_values(15, 1);
    let w = test_values(5, 2);
    let b = test_values(5, 3);
    let g = test_values(15, 4);

    let xt = Tensor::<CpuRuntime>::from_slice(&x, &shape, &device);
    let wt = Tensor::<CpuRuntime>::from_slice(&w, &[5], &device);
    let bt = Tensor::<CpuRuntime>::from_slice(&b, &[5], &device);
    let gt = Tensor::<CpuRuntime>::from_slice(&g, &shape, &device);

    let fwd = client
        .native_layer_norm(&xt, &[5], Some(&wt), Some(&bt), 1e-5)
        .unwrap();
    let grads = client
        .native_layer_norm_backward(
            &gt,
            &xt,
            &[5],
            &fwd.mean,
            &fwd.rstd,
            Some(&wt),
            Some(&bt),
            GradMask::all(),
        )
        .unwrap();

    let params: [&[f64]; 3] = [&x, &w, &b];
    let analytic = [
        grads.grad_input.unwrap().to_vec::<f64>(),
        grads.grad_weight.unwrap().to_vec::<f64>(),
        grads.grad_bias.unwrap().to_vec::<f64>(),
    ];

    for (which, name) in ["dx", "dw", "db"].into_iter().enumerate() {
        let numeric = numeric_grad(&client, params, which, &g, &shape, &device);
        assert_allclose_f64(&analytic[which], &numeric, 1e-4, 1e-6, name);
    }
}

#[test]
fn test_backward_without_weight() {
    let (client, device) = create_cpu_client();
    let x = random_tensor_f64(&[4, 6], 8, &device);
    let dy = random_tensor_f64(&[4, 6], 9, &device);
    let fwd = client
        .native_layer_norm(&x, &[6], None, None, 1e-5)
        .unwrap();

    let grads = client
        .native_layer_norm_backward(
            &dy,
            &x,
            &[6],
            &fwd.mean,
            &fwd.rstd,
            None,
            None,
            GradMask::all(),
        )
        .unwrap();

    // No parameters, no parameter gradients
    assert!(grads.grad_weight.is_none());
    assert!(grads.grad_bias.is_none());

    // Each row of dx sums to zero: shifting a row leaves the output unchanged
    let dx = grads.grad_input.unwrap().to_vec::<f64>();
    for row in dx.chunks(6) {
        assert!(row.iter().sum::<f64>().abs() < 1e-10);
    }
}

#[test]
fn test_backward_bias_grad_is_column_sum() {
    let (client, device) = create_cpu_client();
    let x = random_tensor_f64(&[3, 2], 1, &device);
    let w = Tensor::<CpuRuntime>::ones(&[2], DType::F64, &device);
    let b = Tensor::<CpuRuntime>::zeros(&[2], DType::F64, &device);
    let dy_data = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
    let dy = Tensor::<CpuRuntime>::from_slice(&dy_data, &[3, 2], &device);
    let fwd = client
        .native_layer_norm(&x, &[2], Some(&w), Some(&b), 1e-5)
        .unwrap();

    let grads = client
        .native_layer_norm_backward(
            &dy,
            &x,
            &[2],
            &fwd.mean,
            &fwd.rstd,
            Some(&w),
            Some(&b),
            GradMask::from([false, false, true]),
        )
        .unwrap();

    assert!(grads.grad_input.is_none());
    assert!(grads.grad_weight.is_none());
    let db = grads.grad_bias.unwrap();
    assert_eq!(db.shape(), &[2]);
    assert_eq!(db.to_vec::<f64>(), vec![9.0, 12.0]);
}

#[test]
fn test_backward_grad_mask() {
    let device = CpuDevice::new();
    let client = counting_client(&device, mask_backward);
    let x = random_tensor_f64(&[4, 3], 2, &device);
    let w = random_tensor_f64(&[3], 3, &device);
    let b = random_tensor_f64(&[3], 4, &device);
    let dy = random_tensor_f64(&[4, 3], 5, &device);
    let fwd = client
        .native_layer_norm(&x, &[3], Some(&w), Some(&b), 1e-5)
        .unwrap();

    let full = client
        .native_layer_norm_backward(
            &dy,
            &x,
            &[3],
            &fwd.mean,
            &fwd.rstd,
            Some(&w),
            Some(&b),
            GradMask::all(),
        )
        .unwrap();

    for bits in 0..8u8 {
        let mask = GradMask::from([bits & 1 != 0, bits & 2 != 0, bits & 4 != 0]);
        let before = MASK_CALLS.load(Ordering::SeqCst);
        let grads = client
            .native_layer_norm_backward(
                &dy,
                &x,
                &[3],
                &fwd.mean,
                &fwd.rstd,
                Some(&w),
                Some(&b),
                mask,
            )
            .unwrap();
        let calls = MASK_CALLS.load(Ordering::SeqCst) - before;

        assert_eq!(grads.grad_input.is_some(), mask.input, "{mask:?}");
        assert_eq!(grads.grad_weight.is_some(), mask.weight, "{mask:?}");
        assert_eq!(grads.grad_bias.is_some(), mask.bias, "{mask:?}");
        assert_eq!(calls, usize::from(mask.any()), "{mask:?}");

        // Subsets compute the same values as the full request
        if let Some(dx) = grads.grad_input {
            let expected = full.grad_input.as_ref().unwrap().to_vec::<f64>();
            assert_eq!(dx.to_vec::<f64>(), expected);
        }
        if let Some(dw) = grads.grad_weight {
            let expected = full.grad_weight.as_ref().unwrap().to_vec::<f64>();
            assert_eq!(dw.to_vec::<f64>(), expected);
        }
        if let Some(db) = grads.grad_bias {
            let expected = full.grad_bias.as_ref().unwrap().to_vec::<f64>();
            assert_eq!(db.to_vec::<f64>(), expected);
        }
    }
}

#[test]
fn test_backward_zero_batch() {
    let device = CpuDevice::new();
    let client = counting_client(&device, empty_batch_backward);
    let x = Tensor::<CpuRuntime>::empty(&[0, 3], DType::F32, &device);
    let dy = Tensor::<CpuRuntime>::empty(&[0, 3], DType::F32, &device);
    let w = Tensor::<CpuRuntime>::ones(&[3], DType::F32, &device);
    let b = Tensor::<CpuRuntime>::zeros(&[3], DType::F32, &device);
    let fwd = client
        .native_layer_norm(&x, &[3], Some(&w), Some(&b), 1e-5)
        .unwrap();

    let grads = client
        .native_layer_norm_backward(
            &dy,
            &x,
            &[3],
            &fwd.mean,
            &fwd.rstd,
            Some(&w),
            Some(&b),
            GradMask::all(),
        )
        .unwrap();
    assert_eq!(EMPTY_BATCH_CALLS.load(Ordering::SeqCst), 0);

    let dx = grads.grad_input.unwrap();
    assert_eq!(dx.numel(), 0);
    assert_eq!(grads.grad_weight.unwrap().to_vec::<f32>(), vec![0.0; 3]);
    assert_eq!(grads.grad_bias.unwrap().to_vec::<f32>(), vec![0.0; 3]);
}

#[test]
fn test_backward_non_contiguous_grad() {
    let (client, device) = create_cpu_client();
    let x = random_tensor_f64(&[4, 4], 12, &device);
    let dy = random_tensor_f64(&[4, 4], 13, &device);
    let dy = dy.transpose(0, 1).unwrap();
    let dy_packed = dy.contiguous();
    let fwd = client
        .native_layer_norm(&x, &[4], None, None, 1e-5)
        .unwrap();

    let mut dx = Vec::new();
    for grad_out in [&dy, &dy_packed] {
        let grads = client
            .native_layer_norm_backward(
                grad_out,
                &x,
                &[4],
                &fwd.mean,
                &fwd.rstd,
                None,
                None,
                GradMask::all(),
            )
            .unwrap();
        dx.push(grads.grad_input.unwrap().to_vec::<f64>());
    }

    assert_eq!(dx[0], dx[1]);
}

#[test]
fn test_backward_validation() {
    let (client, device) = create_cpu_client();
    let x = random_tensor_f64(&[2, 3], 1, &device);
    let fwd = client
        .native_layer_norm(&x, &[3], None, None, 1e-5)
        .unwrap();
    let mask = GradMask::all();

    let bad_grad = random_tensor_f64(&[3, 2], 2, &device);
    let result = client.native_layer_norm_backward(
        &bad_grad,
        &x,
        &[3],
        &fwd.mean,
        &fwd.rstd,
        None,
        None,
        mask,
    );
    assert!(matches!(result, Err(Error::ShapeMismatch { .. })));

    let short = random_tensor_f64(&[1, 1], 3, &device);
    let result = client.native_layer_norm_backward(
        &x,
        &x,
        &[3],
        &short,
        &fwd.rstd,
        None,
        None,
        mask,
    );
    assert!(matches!(result, Err(Error::ShapeMismatch { .. })));

    let f32_grad = Tensor::<CpuRuntime>::zeros(&[2, 3], DType::F32, &device);
    let result = client.native_layer_norm_backward(
        &f32_grad,
        &x,
        &[3],
        &fwd.mean,
        &fwd.rstd,
        None,
        None,
        mask,
    );
    assert!(matches!(result, Err(Error::DTypeMismatch { .. })));

    let result = client.native_layer_norm_backward(
        &x,
        &x,
        &[],
        &fwd.mean,
        &fwd.rstd,
        None,
        None,
        mask,
    );
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
}

#[test]
fn test_backward_without_kernel() {
    let (_, device) = create_cpu_client();
    let client = CpuClient::new(device.clone()).with_registry(KernelRegistry::new());
    let x = random_tensor_f64(&[2, 3], 1, &device);
    let stats = Tensor::<CpuRuntime>::zeros(&[2, 1], DType::F64, &device);

    let result = client.native_layer_norm_backward(
        &x,
        &x,
        &[3],
        &stats,
        &stats,
        None,
        None,
        GradMask::all(),
    );
    assert!(matches!(
        result,
        Err(Error::KernelNotRegistered {
            op: "layer_norm_backward",
            device: DeviceType::Cpu
        })
    ));

    // Nothing requested: no kernel lookup
    let result = client.native_layer_norm_backward(
        &x,
        &x,
        &[3],
        &stats,
        &stats,
        None,
        None,
        GradMask::none(),
    );
    assert!(result.is_ok());
}
