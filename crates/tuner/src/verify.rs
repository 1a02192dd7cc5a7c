//! Correctness verification of a compiled configuration.

use crate::error::TuneError;
use gridtune_backend::{BlockDim, DeviceArg, DeviceBackend, GridDim, KernelArg, KernelHandle};
use tracing::warn;

/// Run the compiled kernel once and compare every checked argument against
/// its expected value.
///
/// Each argument with a present answer entry has its device buffer zeroed
/// first, so stale output from earlier configurations can never satisfy the
/// check. Comparison is element-wise within the absolute tolerance `atol`.
/// A mismatch is a logic defect, not a resource limit, and is surfaced as
/// [`TuneError::FailedCorrectness`]; backend failures keep their backend
/// classification so the orchestrator can still skip recoverable launches.
pub fn check_kernel_correctness(
    backend: &mut dyn DeviceBackend,
    kernel: KernelHandle,
    args: &[DeviceArg],
    threads: BlockDim,
    grid: GridDim,
    answer: &[Option<KernelArg>],
    atol: f64,
    instance: &str,
) -> Result<(), TuneError> {
    let backend_err = |source| TuneError::Backend {
        instance: instance.to_string(),
        source,
    };

    for (arg, expected) in args.iter().zip(answer) {
        if expected.is_some() {
            backend.memset_zero(arg).map_err(backend_err)?;
        }
    }
    backend
        .run_kernel(kernel, args, threads, grid)
        .map_err(backend_err)?;

    let mut correct = true;
    for (position, (arg, expected)) in args.iter().zip(answer).enumerate() {
        let Some(expected) = expected else {
            continue;
        };
        let mut result = expected.zeros_like();
        backend.memcpy_dtoh(&mut result, arg).map_err(backend_err)?;
        if !result.allclose(expected, atol) {
            warn!(
                config = %instance,
                argument = position,
                "kernel output does not match the expected answer"
            );
            correct = false;
        }
    }

    if correct {
        Ok(())
    } else {
        Err(TuneError::FailedCorrectness {
            instance: instance.to_string(),
        })
    }
}
