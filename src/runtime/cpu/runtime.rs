//! CPU runtime implementation

use super::client::CpuClient;
use super::device::CpuDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::alloc::{Layout as AllocLayout, alloc, dealloc};

/// Cache-line alignment for every CPU buffer
const ALIGN: usize = 64;

/// CPU compute runtime
///
/// Memory is allocated on the heap using the system allocator.
#[derive(Clone, Debug, Default)]
pub struct CpuRuntime;

fn alloc_layout(size_bytes: usize) -> Result<AllocLayout> {
    AllocLayout::from_size_align(size_bytes, ALIGN)
        .map_err(|e| Error::Internal(format!("invalid allocation layout: {e}")))
}

impl Runtime for CpuRuntime {
    type Device = CpuDevice;
    type Client = CpuClient;

    fn name() -> &'static str {
        "cpu"
    }

    fn allocate(size_bytes: usize, _device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let layout = alloc_layout(size_bytes)?;
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory { size: size_bytes });
        }

        Ok(ptr as u64)
    }

    fn deallocate(ptr: u64, size_bytes: usize, _device: &Self::Device) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }

        // Same size and alignment as allocate, which already validated them.
        if let Ok(layout) = alloc_layout(size_bytes) {
            unsafe {
                dealloc(ptr as *mut u8, layout);
            }
        }
    }

    fn copy_to_device(src: &[u8], dst: u64, _device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst as *mut u8, src.len());
        }
        Ok(())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], _device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn copy_strided(
        src_handle: u64,
        src_byte_offset: usize,
        dst_handle: u64,
        shape: &[usize],
        strides: &[isize],
        elem_size: usize,
        _device: &Self::Device,
    ) -> Result<()> {
        let numel: usize = shape.iter().product();
        if src_handle == 0 || dst_handle == 0 || numel == 0 {
            return Ok(());
        }

        let src_base = (src_handle as usize + src_byte_offset) as *const u8;
        let dst_base = dst_handle as *mut u8;

        let mut indices = vec![0usize; shape.len()];
        let mut src_elem_offset: isize = 0;

        for dst_offset in 0..numel {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    src_base.offset(src_elem_offset * elem_size as isize),
                    dst_base.add(dst_offset * elem_size),
                    elem_size,
                );
            }

            // Row-major increment, carrying the source offset along
            for dim in (0..shape.len()).rev() {
                indices[dim] += 1;
                src_elem_offset += strides[dim];
                if indices[dim] < shape[dim] {
                    break;
                }
                src_elem_offset -= strides[dim] * shape[dim] as isize;
                indices[dim] = 0;
            }
        }

        Ok(())
    }

    fn default_device() -> Self::Device {
        CpuDevice::new()
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        CpuClient::new(device.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sized_allocation_is_null() {
        let device = CpuDevice::new();
        assert_eq!(CpuRuntime::allocate(0, &device).unwrap(), 0);
        CpuRuntime::deallocate(0, 0, &device);
    }

    #[test]
    fn test_allocation_is_aligned() {
        let device = CpuDevice::new();
        let ptr = CpuRuntime::allocate(24, &device).unwrap();
        assert_eq!(ptr as usize % ALIGN, 0);
        CpuRuntime::deallocate(ptr, 24, &device);
    }

    #[test]
    fn test_copy_strided_transposes() {
        let device = CpuDevice::new();
        let src = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut dst = [0.0f32; 6];
        // [2, 3] row-major viewed as [3, 2] with strides [1, 3]
        CpuRuntime::copy_strided(
            src.as_ptr() as u64,
            0,
            dst.as_mut_ptr() as u64,
            &[3, 2],
            &[1, 3],
            4,
            &device,
        )
        .unwrap();
        assert_eq!(dst, [1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
