//! Shape and dtype validation shared by every layer-norm entry point

use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Row decomposition of a layer-norm input
///
/// The input is treated as `m` rows of `n` elements: `axis` splits its shape
/// into the outer dimensions (flattened into `m`) and the normalized
/// dimensions (flattened into `n`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerNormDims {
    /// First normalized dimension, `input.ndim() - normalized_shape.len()`
    pub axis: usize,
    /// Number of rows: product of `input_shape[..axis]`
    pub m: usize,
    /// Row length: product of `input_shape[axis..]`
    pub n: usize,
}

impl LayerNormDims {
    /// Shape of the saved statistics: outer dims kept, normalized dims set to 1
    pub fn stat_shape(&self, input_shape: &[usize]) -> Vec<usize> {
        input_shape[..self.axis]
            .iter()
            .copied()
            .chain(std::iter::repeat_n(1, input_shape.len() - self.axis))
            .collect()
    }
}

/// Validate the operands of a layer-norm call and split the input into rows
///
/// Checks run in order: `normalized_shape` non-empty, `weight` shape, `bias`
/// shape, then the input's rank and trailing dimensions.
pub fn resolve_layer_norm_shape(
    input_shape: &[usize],
    normalized_shape: &[usize],
    weight_shape: Option<&[usize]>,
    bias_shape: Option<&[usize]>,
) -> Result<LayerNormDims> {
    let k = normalized_shape.len();
    if k == 0 {
        return Err(Error::invalid_argument(
            "normalized_shape",
            "Expected normalized_shape to be at least 1-dimensional, i.e., \
             containing at least one element, but got normalized_shape=[]",
        ));
    }

    for param in [weight_shape, bias_shape].into_iter().flatten() {
        if param != normalized_shape {
            return Err(Error::shape_mismatch(normalized_shape, param));
        }
    }

    let ndim = input_shape.len();
    if ndim < k {
        return Err(Error::invalid_argument(
            "input",
            format!(
                "Given normalized_shape={normalized_shape:?}, expected input with \
                 shape [*, {}], but got input of size {input_shape:?}",
                join_dims(normalized_shape)
            ),
        ));
    }

    let axis = ndim - k;
    let suffix = &input_shape[axis..];
    if suffix != normalized_shape {
        return Err(Error::shape_mismatch(normalized_shape, suffix));
    }

    Ok(LayerNormDims {
        axis,
        m: input_shape[..axis].iter().product(),
        n: suffix.iter().product(),
    })
}

/// Require `weight`, `bias` and any extra operands to match the input's dtype
pub fn validate_layer_norm_dtypes<R: Runtime>(
    input: &Tensor<R>,
    operands: &[Option<&Tensor<R>>],
) -> Result<()> {
    let dtype = input.dtype();
    for t in operands.iter().flatten() {
        if t.dtype() != dtype {
            return Err(Error::DTypeMismatch {
                lhs: dtype,
                rhs: t.dtype(),
            });
        }
    }
    Ok(())
}

/// Reject an output buffer that shares storage with any operand
pub fn validate_no_alias<R: Runtime>(
    out: &Tensor<R>,
    operands: &[Option<&Tensor<R>>],
) -> Result<()> {
    let out_ptr = out.storage().ptr();
    if out_ptr == 0 {
        return Ok(());
    }
    if operands
        .iter()
        .flatten()
        .any(|t| t.storage().ptr() == out_ptr)
    {
        return Err(Error::invalid_argument(
            "out",
            "output buffer must not share storage with an operand",
        ));
    }
    Ok(())
}

fn join_dims(dims: &[usize]) -> String {
    dims.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
