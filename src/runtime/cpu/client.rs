//! CPU client: operation dispatch, kernel registry and parallelism settings

use super::device::CpuDevice;
use super::registry::default_registry;
use super::runtime::CpuRuntime;
use crate::runtime::{KernelRegistry, RuntimeClient};
use std::sync::Arc;

/// Default lower bound on rows handed to one rayon task
pub const DEFAULT_MIN_LEN: usize = 16;

/// Thread-level parallelism settings for CPU kernels
///
/// Kernels split their independent rows (or columns, for parameter gradient
/// reductions) across rayon tasks of at least `min_len` items.
///
/// # Example
///
/// ```ignore
/// let client = CpuRuntime::default_client(&device)
///     .with_parallelism(ParallelismConfig::new(Some(4), None));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParallelismConfig {
    /// Worker threads; `None` uses the global rayon pool
    pub num_threads: Option<usize>,
    /// Minimum items per rayon task; `None` uses [`DEFAULT_MIN_LEN`]
    pub min_len: Option<usize>,
}

impl ParallelismConfig {
    /// Create a parallelism configuration
    pub fn new(num_threads: Option<usize>, min_len: Option<usize>) -> Self {
        Self {
            num_threads,
            min_len,
        }
    }

    /// Run every kernel on the calling thread
    pub fn serial() -> Self {
        Self::new(Some(1), None)
    }
}

/// CPU client for operation dispatch
#[derive(Clone)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    parallelism: ParallelismConfig,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
    registry: Arc<KernelRegistry<CpuRuntime>>,
}

impl CpuClient {
    /// Create a new CPU client using the process-wide CPU kernel registry
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            parallelism: ParallelismConfig::default(),
            #[cfg(feature = "rayon")]
            pool: None,
            registry: default_registry(),
        }
    }

    /// Replace the parallelism settings
    ///
    /// A dedicated thread pool is built when `num_threads` is set. If the pool
    /// cannot be created the client keeps using the global pool.
    pub fn with_parallelism(mut self, config: ParallelismConfig) -> Self {
        #[cfg(feature = "rayon")]
        {
            self.pool = config.num_threads.and_then(|threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| log::warn!("cpu: falling back to global rayon pool: {e}"))
                    .ok()
                    .map(Arc::new)
            });
        }
        self.parallelism = config;
        self
    }

    /// Replace the kernel registry this client dispatches through
    pub fn with_registry(mut self, registry: KernelRegistry<CpuRuntime>) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Current parallelism settings
    pub fn parallelism(&self) -> ParallelismConfig {
        self.parallelism
    }

    /// Minimum items per rayon task
    #[inline]
    #[cfg_attr(not(feature = "rayon"), allow(dead_code))]
    pub(crate) fn rayon_min_len(&self) -> usize {
        self.parallelism.min_len.unwrap_or(DEFAULT_MIN_LEN).max(1)
    }

    /// Run `f` inside this client's thread pool, or the global pool if none
    #[cfg(feature = "rayon")]
    pub(crate) fn install_parallelism<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) {
        // CPU operations are synchronous, nothing to do
    }

    fn kernel_registry(&self) -> &KernelRegistry<CpuRuntime> {
        &self.registry
    }
}

impl std::fmt::Debug for CpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuClient")
            .field("device", &self.device)
            .field("parallelism", &self.parallelism)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{DeviceType, Runtime};

    #[test]
    fn test_default_client_has_cpu_kernels() {
        let device = CpuDevice::new();
        let client = CpuRuntime::default_client(&device);
        assert!(client.kernel_registry().has_layer_norm(DeviceType::Cpu));
        assert_eq!(client.rayon_min_len(), DEFAULT_MIN_LEN);
    }

    #[test]
    fn test_with_registry_replaces_kernels() {
        let client = CpuClient::new(CpuDevice::new()).with_registry(KernelRegistry::new());
        assert!(!client.kernel_registry().has_layer_norm(DeviceType::Cpu));
    }

    #[test]
    fn test_with_parallelism() {
        let client = CpuClient::new(CpuDevice::new())
            .with_parallelism(ParallelismConfig::new(Some(2), Some(0)));
        assert_eq!(client.parallelism().num_threads, Some(2));
        assert_eq!(client.rayon_min_len(), 1);
    }
}
