//! Trait for device identification

/// Backend family of a device
///
/// This is the dispatch key for kernel lookup: every device of a family shares
/// one set of kernels in a [`KernelRegistry`](crate::runtime::KernelRegistry).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DeviceType {
    /// Host CPU
    Cpu,
    /// NVIDIA GPU via CUDA
    Cuda,
    /// Portable GPU via WebGPU
    Wgpu,
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Backend family used to select kernels for this device
    fn device_type(&self) -> DeviceType;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}
