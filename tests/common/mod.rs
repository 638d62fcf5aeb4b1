//! Common test utilities
#![allow(dead_code)]

use layernorm::runtime::Runtime;
use layernorm::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use layernorm::tensor::Tensor;

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// Deterministic pseudo-random values in `[-2, 2)`
pub fn test_values(len: usize, seed: u64) -> Vec<f64> {
    let mut state = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) * 4.0 - 2.0
        })
        .collect()
}

/// Build an f64 tensor from [`test_values`]
pub fn random_tensor_f64(shape: &[usize], seed: u64, device: &CpuDevice) -> Tensor<CpuRuntime> {
    let len = shape.iter().product();
    Tensor::<CpuRuntime>::from_slice(&test_values(len, seed), shape, device)
}

/// Build an f32 tensor from [`test_values`]
pub fn random_tensor_f32(shape: &[usize], seed: u64, device: &CpuDevice) -> Tensor<CpuRuntime> {
    let len = shape.iter().product();
    let data: Vec<f32> = test_values(len, seed)
        .into_iter()
        .map(|v| v as f32)
        .collect();
    Tensor::<CpuRuntime>::from_slice(&data, shape, device)
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
