//! Trait for runtime clients that handle operation dispatch

use super::Runtime;
use crate::runtime::KernelRegistry;

/// Trait for runtime clients that handle operation dispatch
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations to complete
    fn synchronize(&self);

    /// Kernels this client dispatches fused operations to
    fn kernel_registry(&self) -> &KernelRegistry<R>;
}
