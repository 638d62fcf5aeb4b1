//! Helper macros and functions for CPU kernels

use super::client::CpuClient;

/// Macro for runtime dtype dispatch to typed operations.
///
/// Executes `$body` with `$T` bound to the Rust type behind `$dtype`. The
/// enclosing function must return `Result<_>`: half-precision dtypes without
/// the `f16` feature return `Error::FeatureRequired`.
///
/// ```ignore
/// dispatch_dtype!(tensor.dtype(), T => {
///     unsafe { kernels::layer_norm_forward_kernel::<T>(/* ... */) }
/// }, "layer_norm");
/// ```
#[macro_export]
#[doc(hidden)]
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::F16 => {
                $crate::dispatch_f16_type!($T, $body, $dtype, $error_op, half::f16)
            }
            $crate::dtype::DType::BF16 => {
                $crate::dispatch_f16_type!($T, $body, $dtype, $error_op, half::bf16)
            }
        }
    };
}

/// Internal helper macro to dispatch types requiring the "f16" feature.
#[macro_export]
#[doc(hidden)]
macro_rules! dispatch_f16_type {
    ($T:ident, $body:block, $dtype:expr, $error_op:expr, $type:ty) => {{
        #[cfg(feature = "f16")]
        {
            type $T = $type;
            $body
        }
        #[cfg(not(feature = "f16"))]
        {
            let _ = $error_op;
            return Err($crate::error::Error::FeatureRequired {
                dtype: $dtype,
                feature: "f16",
            });
        }
    }};
}

/// Run `f(i)` for every `i` in `0..len`, split across the client's rayon pool.
///
/// Iterations must be independent: each index owns a disjoint part of any
/// output it writes.
pub(crate) fn parallel_for<F>(client: &CpuClient, len: usize, f: F)
where
    F: Fn(usize) + Send + Sync,
{
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;

        let min_len = client.rayon_min_len();
        client.install_parallelism(|| {
            (0..len).into_par_iter().with_min_len(min_len).for_each(&f);
        });
    }

    #[cfg(not(feature = "rayon"))]
    {
        let _ = client;
        (0..len).for_each(f);
    }
}
