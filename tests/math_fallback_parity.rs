//! Parity between the fused layer-norm kernel and the composed fallback

mod common;

use common::{
    assert_allclose_f32, assert_allclose_f64, create_cpu_client, random_tensor_f32,
    random_tensor_f64,
};
use layernorm::dtype::DType;
use layernorm::error::Error;
use layernorm::ops::LayerNormOps;
use layernorm::runtime::cpu::{CpuClient, CpuRuntime};
use layernorm::runtime::{DeviceType, KernelRegistry};
use layernorm::tensor::Tensor;

#[test]
fn test_fallback_matches_fused_f64() {
    let (client, device) = create_cpu_client();
    let x = random_tensor_f64(&[3, 4, 6], 21, &device);
    let w = random_tensor_f64(&[4, 6], 22, &device);
    let b = random_tensor_f64(&[4, 6], 23, &device);

    let params = [
        (None, None),
        (Some(&w), None),
        (None, Some(&b)),
        (Some(&w), Some(&b)),
    ];
    for (weight, bias) in params {
        let fused = client
            .native_layer_norm(&x, &[4, 6], weight, bias, 1e-5)
            .unwrap();
        let composed = client
            .math_layer_norm(&x, &[4, 6], weight, bias, 1e-5)
            .unwrap();

        let label = format!("weight={} bias={}", weight.is_some(), bias.is_some());
        assert_eq!(composed.output.shape(), fused.output.shape());
        assert_eq!(composed.mean.shape(), &[3, 1, 1]);
        assert_eq!(composed.rstd.shape(), &[3, 1, 1]);
        assert_allclose_f64(
            &composed.output.to_vec::<f64>(),
            &fused.output.to_vec::<f64>(),
            1e-5,
            1e-10,
            &label,
        );
        assert_allclose_f64(
            &composed.mean.to_vec::<f64>(),
            &fused.mean.to_vec::<f64>(),
            1e-5,
            1e-12,
            &label,
        );
        assert_allclose_f64(
            &composed.rstd.to_vec::<f64>(),
            &fused.rstd.to_vec::<f64>(),
            1e-5,
            1e-12,
            &label,
        );
    }
}

#[test]
fn test_fallback_matches_fused_f32() {
    let (client, device) = create_cpu_client();
    let x = random_tensor_f32(&[17, 10], 31, &device);
    let w = random_tensor_f32(&[10], 32, &device);
    let b = random_tensor_f32(&[10], 33, &device);

    let fused = client
        .native_layer_norm(&x, &[10], Some(&w), Some(&b), 1e-5)
        .unwrap();
    let composed = client
        .math_layer_norm(&x, &[10], Some(&w), Some(&b), 1e-5)
        .unwrap();

    assert_allclose_f32(
        &composed.output.to_vec::<f32>(),
        &fused.output.to_vec::<f32>(),
        1e-5,
        1e-6,
        "output",
    );
    assert_allclose_f32(
        &composed.mean.to_vec::<f32>(),
        &fused.mean.to_vec::<f32>(),
        1e-5,
        1e-6,
        "mean",
    );
    assert_allclose_f32(
        &composed.rstd.to_vec::<f32>(),
        &fused.rstd.to_vec::<f32>(),
        1e-5,
        1e-6,
        "rstd",
    );
}

#[test]
fn test_fallback_zero_batch() {
    let (client, device) = create_cpu_client();
    let x = Tensor::<CpuRuntime>::empty(&[0, 4], DType::F64, &device);
    let w = Tensor::<CpuRuntime>::ones(&[4], DType::F64, &device);

    let out = client
        .math_layer_norm(&x, &[4], Some(&w), None, 1e-5)
        .unwrap();

    assert_eq!(out.output.shape(), &[0, 4]);
    assert_eq!(out.mean.shape(), &[0, 1]);
    assert_eq!(out.rstd.shape(), &[0, 1]);
}

#[test]
fn test_fallback_validates_like_fused() {
    let (client, device) = create_cpu_client();
    let x = random_tensor_f64(&[2, 3], 1, &device);
    let w = random_tensor_f64(&[2], 2, &device);

    assert!(matches!(
        client.math_layer_norm(&x, &[3], Some(&w), None, 1e-5),
        Err(Error::ShapeMismatch { .. })
    ));
    assert!(matches!(
        client.math_layer_norm(&x, &[], None, None, 1e-5),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn test_layer_norm_uses_fallback_without_kernel() {
    let (fused_client, device) = create_cpu_client();
    let bare_client = CpuClient::new(device.clone()).with_registry(KernelRegistry::new());
    let x = random_tensor_f64(&[5, 8], 41, &device);
    let w = random_tensor_f64(&[8], 42, &device);
    let b = random_tensor_f64(&[8], 43, &device);

    assert!(matches!(
        bare_client.native_layer_norm(&x, &[8], Some(&w), Some(&b), 1e-5),
        Err(Error::KernelNotRegistered {
            op: "layer_norm",
            device: DeviceType::Cpu
        })
    ));

    let via_fallback = bare_client
        .layer_norm(&x, &[8], Some(&w), Some(&b), 1e-5)
        .unwrap();
    let via_kernel = fused_client
        .layer_norm(&x, &[8], Some(&w), Some(&b), 1e-5)
        .unwrap();

    assert_eq!(via_fallback.shape(), &[5, 8]);
    assert_allclose_f64(
        &via_fallback.to_vec::<f64>(),
        &via_kernel.to_vec::<f64>(),
        1e-5,
        1e-10,
        "layer_norm",
    );
}
