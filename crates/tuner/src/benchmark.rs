//! Robust timing aggregation.

use gridtune_backend::{BackendError, BlockDim, DeviceArg, DeviceBackend, GridDim, KernelHandle};

/// Default number of benchmark repetitions per configuration.
pub const DEFAULT_ITERATIONS: usize = 7;

/// Runs a compiled configuration repeatedly and reduces the samples to a
/// robust average: the single fastest and single slowest run are discarded
/// to absorb warm-up and scheduling jitter, and the rest are averaged.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkRunner {
    iterations: usize,
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl BenchmarkRunner {
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Benchmark one compiled configuration, in milliseconds.
    pub fn measure(
        &self,
        backend: &mut dyn DeviceBackend,
        kernel: KernelHandle,
        args: &[DeviceArg],
        threads: BlockDim,
        grid: GridDim,
    ) -> Result<f64, BackendError> {
        let samples = backend.benchmark(kernel, args, threads, grid, self.iterations)?;
        if samples.is_empty() {
            return Err(BackendError::Device(
                "backend returned no timing samples".into(),
            ));
        }
        Ok(robust_average(&samples))
    }
}

/// Mean of the samples after dropping the single minimum and maximum.
///
/// With fewer than three samples there is nothing sensible to trim and the
/// plain mean is returned.
pub fn robust_average(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let kept: &[f64] = if sorted.len() >= 3 {
        &sorted[1..sorted.len() - 1]
    } else {
        &sorted
    };
    kept.iter().sum::<f64>() / kept.len() as f64
}
