//! Core Tensor type

use super::{Layout, Storage};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::fmt;

/// N-dimensional array stored on a compute device
///
/// `Tensor` is a reference-counted [`Storage`] plus a [`Layout`] describing the
/// view into it. Cloning and view operations (`reshape`, `transpose`,
/// `broadcast_to`) share storage; only [`Tensor::contiguous`] and the
/// constructors allocate.
///
/// # Example
///
/// ```ignore
/// use layernorm::prelude::*;
///
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);
/// let b = a.transpose(0, 1)?; // Zero-copy, shares storage with a
/// ```
pub struct Tensor<R: Runtime> {
    storage: Storage<R>,
    layout: Layout,
}

impl<R: Runtime> Tensor<R> {
    /// Create a tensor from storage and layout
    pub fn from_parts(storage: Storage<R>, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Create a tensor from a slice of data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of the `shape` dimensions.
    /// For a fallible alternative, use [`Self::try_from_slice`].
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], device: &R::Device) -> Self {
        Self::try_from_slice(data, shape, device).expect("Tensor::from_slice failed")
    }

    /// Create a tensor from a slice of data (fallible version)
    pub fn try_from_slice<T: Element>(
        data: &[T],
        shape: &[usize],
        device: &R::Device,
    ) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }

        let storage = Storage::from_slice(data, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create a tensor with unspecified contents
    ///
    /// The buffer must be written before it is read.
    pub fn empty(shape: &[usize], dtype: DType, device: &R::Device) -> Self {
        Self::try_empty(shape, dtype, device).expect("Tensor::empty failed")
    }

    /// Create a tensor with unspecified contents (fallible version)
    pub fn try_empty(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len: usize = shape.iter().product();
        let storage = Storage::new(len, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create a contiguous tensor with this tensor's shape, dtype and device
    pub fn try_empty_like(&self) -> Result<Self> {
        Self::try_empty(self.shape(), self.dtype(), self.device())
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Self {
        Self::try_zeros(shape, dtype, device).expect("Tensor::zeros failed")
    }

    /// Create a tensor filled with zeros (fallible version)
    pub fn try_zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        Self::try_full_scalar(shape, dtype, 0.0, device)
    }

    /// Create a zero-filled tensor with this tensor's shape, dtype and device
    pub fn try_zeros_like(&self) -> Result<Self> {
        Self::try_zeros(self.shape(), self.dtype(), self.device())
    }

    /// Create a tensor filled with ones
    pub fn ones(shape: &[usize], dtype: DType, device: &R::Device) -> Self {
        Self::try_full_scalar(shape, dtype, 1.0, device).expect("Tensor::ones failed")
    }

    /// Create a tensor filled with a scalar value
    ///
    /// The scalar is rounded to the target dtype.
    pub fn full_scalar(shape: &[usize], dtype: DType, value: f64, device: &R::Device) -> Self {
        Self::try_full_scalar(shape, dtype, value, device).expect("Tensor::full_scalar failed")
    }

    /// Create a tensor filled with a scalar value (fallible version)
    pub fn try_full_scalar(
        shape: &[usize],
        dtype: DType,
        value: f64,
        device: &R::Device,
    ) -> Result<Self> {
        #[inline]
        fn typed_to_bytes<T: bytemuck::NoUninit>(v: Vec<T>) -> Vec<u8> {
            bytemuck::cast_slice::<T, u8>(&v).to_vec()
        }

        let len: usize = shape.iter().product();
        if len == 0 {
            return Self::try_empty(shape, dtype, device);
        }

        // Built as typed vectors first so f64 data is never read through a
        // misaligned byte buffer.
        let bytes: Vec<u8> = match dtype {
            DType::F64 => typed_to_bytes(vec![value; len]),
            DType::F32 => typed_to_bytes(vec![value as f32; len]),
            #[cfg(feature = "f16")]
            DType::F16 => typed_to_bytes(vec![half::f16::from_f64(value); len]),
            #[cfg(feature = "f16")]
            DType::BF16 => typed_to_bytes(vec![half::bf16::from_f64(value); len]),
            #[cfg(not(feature = "f16"))]
            DType::F16 | DType::BF16 => {
                return Err(Error::FeatureRequired {
                    dtype,
                    feature: "f16",
                });
            }
        };

        let storage = Storage::from_bytes(&bytes, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    // ===== Accessors =====

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Device holding the storage
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.storage.device()
    }

    /// Check if the tensor is laid out row-major from the start of its storage
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    // ===== View Operations (Zero-Copy) =====

    fn with_layout(&self, layout: Layout) -> Self {
        Self {
            storage: self.storage.clone(),
            layout,
        }
    }

    /// Transpose two dimensions (zero-copy)
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Result<Self> {
        let layout = self
            .layout
            .transpose(dim0, dim1)
            .ok_or(Error::InvalidDimension {
                dim: dim0,
                ndim: self.ndim(),
            })?;
        Ok(self.with_layout(layout))
    }

    /// Reshape to a new shape (zero-copy, requires contiguity)
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.numel() {
            return Err(Error::shape_mismatch(shape, self.shape()));
        }
        let layout = self.layout.reshape(shape).ok_or(Error::NotContiguous)?;
        Ok(self.with_layout(layout))
    }

    /// View tensor with different shape (alias for reshape)
    pub fn view(&self, shape: &[usize]) -> Result<Self> {
        self.reshape(shape)
    }

    /// Broadcast to a target shape (zero-copy, stride 0 on expanded dims)
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self> {
        let layout = self
            .layout
            .broadcast_to(shape)
            .ok_or_else(|| Error::broadcast(self.shape(), shape))?;
        Ok(self.with_layout(layout))
    }

    /// Make the tensor contiguous in memory
    ///
    /// # Panics
    ///
    /// Panics if the copy cannot be allocated. See [`Self::try_contiguous`].
    pub fn contiguous(&self) -> Self {
        self.try_contiguous()
            .expect("Tensor::contiguous allocation failed")
    }

    /// Make the tensor contiguous in memory (fallible version)
    ///
    /// Returns a shared view if already contiguous; otherwise copies the
    /// strided elements into fresh row-major storage.
    pub fn try_contiguous(&self) -> Result<Self> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }

        let dtype = self.dtype();
        let device = self.storage.device();
        let storage = Storage::new(self.numel(), dtype, device)?;

        let elem_size = dtype.size_in_bytes();
        R::copy_strided(
            self.storage.ptr(),
            self.layout.offset() * elem_size,
            storage.ptr(),
            self.shape(),
            self.strides(),
            elem_size,
            device,
        )?;

        Ok(Self::from_parts(storage, Layout::contiguous(self.shape())))
    }

    // ===== Data Access =====

    /// Copy tensor data to a Vec on the host, in row-major order
    ///
    /// Non-contiguous tensors are copied through [`Self::contiguous`] first.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Vec<T> {
        if !self.is_contiguous() {
            return self.contiguous().to_vec();
        }

        let numel = self.numel();
        let byte_offset = self.layout.offset() * std::mem::size_of::<T>();

        // Typed allocation keeps f64 reads aligned.
        let mut result = vec![T::zeroed(); numel];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        let src_ptr = self.storage.ptr() as usize + byte_offset;
        R::copy_from_device(src_ptr as u64, bytes, self.storage.device())
            .expect("copy_from_device failed in to_vec()");
        result
    }
}

impl<R: Runtime> Clone for Tensor<R> {
    /// Clone creates a new tensor sharing the same storage (zero-copy)
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            layout: self.layout.clone(),
        }
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("contiguous", &self.is_contiguous())
            .finish()
    }
}

impl<R: Runtime> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?}, dtype={})", self.shape(), self.dtype())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_from_slice() {
        let device = CpuDevice::new();
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3], &device);

        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.dtype(), DType::F32);
        assert!(tensor.is_contiguous());
        assert_eq!(tensor.numel(), 6);
        assert_eq!(tensor.to_vec::<f32>(), data);
    }

    #[test]
    fn test_from_slice_length_mismatch() {
        let device = CpuDevice::new();
        let result = Tensor::<CpuRuntime>::try_from_slice(&[1.0f64, 2.0], &[3], &device);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_transpose_then_contiguous() {
        let device = CpuDevice::new();
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3], &device);

        let transposed = tensor.transpose(0, 1).unwrap();
        assert_eq!(transposed.shape(), &[3, 2]);
        assert!(!transposed.is_contiguous());
        assert!(matches!(
            transposed.reshape(&[6]),
            Err(Error::NotContiguous)
        ));

        let dense = transposed.try_contiguous().unwrap();
        assert!(dense.is_contiguous());
        assert_eq!(dense.to_vec::<f32>(), [1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_contiguous_already_contiguous_shares_storage() {
        let device = CpuDevice::new();
        let tensor = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);
        let same = tensor.try_contiguous().unwrap();
        assert_eq!(same.storage().ptr(), tensor.storage().ptr());
        assert_eq!(tensor.storage().ref_count(), 2);
    }

    #[test]
    fn test_reshape_is_a_view() {
        let device = CpuDevice::new();
        let tensor = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0], &[2], &device);
        let viewed = tensor.view(&[2, 1]).unwrap();
        assert_eq!(viewed.shape(), &[2, 1]);
        assert_eq!(viewed.storage().ptr(), tensor.storage().ptr());
        assert!(matches!(
            tensor.view(&[3, 1]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_zeros_and_full() {
        let device = CpuDevice::new();
        let zeros = Tensor::<CpuRuntime>::zeros(&[2, 2], DType::F64, &device);
        assert_eq!(zeros.to_vec::<f64>(), [0.0; 4]);
        let sevens = Tensor::<CpuRuntime>::full_scalar(&[3], DType::F32, 7.0, &device);
        assert_eq!(sevens.to_vec::<f32>(), [7.0; 3]);
        let empty = Tensor::<CpuRuntime>::zeros(&[0, 3], DType::F32, &device);
        assert_eq!(empty.numel(), 0);
        assert!(empty.to_vec::<f32>().is_empty());
    }
}
