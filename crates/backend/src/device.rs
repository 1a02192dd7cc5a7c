//! The device backend contract the tuning core depends on.

use crate::args::{DeviceArg, KernelArg, KernelHandle};
use crate::dims::{BlockDim, GridDim};
use crate::error::BackendError;

/// One execution target: compiles kernel source, stages arguments, launches
/// and times kernels, and moves memory.
///
/// A backend is opened once per sweep and holds the device context for the
/// sweep's duration. All operations are synchronous and blocking; the core
/// never issues concurrent calls.
pub trait DeviceBackend {
    /// Short backend name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Maximum work-items per work-group the device accepts. Configurations
    /// whose thread-block product exceeds this are pruned before compiling.
    fn max_threads(&self) -> usize;

    /// Copy host arguments into device-addressable storage. Buffers become
    /// opaque handles; scalars pass through.
    fn ready_argument_list(&mut self, args: &[KernelArg]) -> Result<Vec<DeviceArg>, BackendError>;

    /// Compile `source` and resolve the entry point `kernel_name`.
    ///
    /// Resource-exhaustion failures are reported as
    /// [`BackendError::Compile`] with the device's message preserved so the
    /// core can classify them (see [`BackendError::is_recoverable`]).
    fn compile(&mut self, kernel_name: &str, source: &str) -> Result<KernelHandle, BackendError>;

    /// Launch the kernel once and wait for completion.
    fn run_kernel(
        &mut self,
        kernel: KernelHandle,
        args: &[DeviceArg],
        threads: BlockDim,
        grid: GridDim,
    ) -> Result<(), BackendError>;

    /// Launch the kernel `iterations` times and return the raw execution
    /// time of each run in milliseconds. Reduction to a robust average is
    /// the core's job.
    fn benchmark(
        &mut self,
        kernel: KernelHandle,
        args: &[DeviceArg],
        threads: BlockDim,
        grid: GridDim,
        iterations: usize,
    ) -> Result<Vec<f64>, BackendError>;

    /// Zero a staged device buffer. A no-op for scalar arguments.
    fn memset_zero(&mut self, arg: &DeviceArg) -> Result<(), BackendError>;

    /// Device-to-host copy of a staged argument into `dest`, which fixes the
    /// expected type and length. Scalars copy their pass-through value.
    fn memcpy_dtoh(&mut self, dest: &mut KernelArg, src: &DeviceArg) -> Result<(), BackendError>;

    /// Bind constant-memory arguments by symbol name. Only accelerator-API
    /// backends have a constant address space; everything else reports
    /// `Unsupported`.
    fn copy_constant_memory_args(
        &mut self,
        args: &[(String, KernelArg)],
    ) -> Result<(), BackendError> {
        let _ = args;
        Err(BackendError::Unsupported {
            operation: "constant memory arguments".into(),
            backend: self.name(),
        })
    }
}
