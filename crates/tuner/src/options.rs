//! Sweep options.

use crate::benchmark::DEFAULT_ITERATIONS;
use gridtune_backend::{BackendKind, KernelArg};

/// Default absolute tolerance for correctness comparison.
pub const DEFAULT_ATOL: f64 = 1e-6;

/// Options controlling one sweep (or one-shot run).
#[derive(Debug, Clone)]
pub struct TuneOptions {
    /// Divisor expressions for the x grid dimension. `None` defaults to
    /// `["block_size_x"]` when that parameter is tuned; an empty list
    /// disables x divisors entirely.
    pub grid_div_x: Option<Vec<String>>,
    /// Divisor expressions for the y grid dimension; no implicit default.
    pub grid_div_y: Option<Vec<String>>,
    /// Boolean expressions every configuration must satisfy.
    pub restrictions: Vec<String>,
    /// Expected post-execution values per argument; `None` entries are not
    /// checked. Supplying an answer enables correctness verification.
    pub answer: Option<Vec<Option<KernelArg>>>,
    /// Report skipped configurations at info level instead of debug.
    pub verbose: bool,
    /// Backend override; detected from the kernel source when `None`.
    pub lang: Option<BackendKind>,
    /// Device index to open.
    pub device: usize,
    /// Constant-memory arguments (accelerator backends only).
    pub constant_memory_args: Vec<(String, KernelArg)>,
    /// Benchmark repetitions per configuration.
    pub iterations: usize,
    /// Absolute tolerance for correctness comparison.
    pub atol: f64,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            grid_div_x: None,
            grid_div_y: None,
            restrictions: Vec::new(),
            answer: None,
            verbose: false,
            lang: None,
            device: 0,
            constant_memory_args: Vec::new(),
            iterations: DEFAULT_ITERATIONS,
            atol: DEFAULT_ATOL,
        }
    }
}

impl TuneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid_div_x<S: Into<String>>(mut self, exprs: impl IntoIterator<Item = S>) -> Self {
        self.grid_div_x = Some(exprs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_grid_div_y<S: Into<String>>(mut self, exprs: impl IntoIterator<Item = S>) -> Self {
        self.grid_div_y = Some(exprs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_restrictions<S: Into<String>>(
        mut self,
        exprs: impl IntoIterator<Item = S>,
    ) -> Self {
        self.restrictions = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_answer(mut self, answer: Vec<Option<KernelArg>>) -> Self {
        self.answer = Some(answer);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_lang(mut self, lang: BackendKind) -> Self {
        self.lang = Some(lang);
        self
    }

    pub fn with_device(mut self, device: usize) -> Self {
        self.device = device;
        self
    }

    pub fn with_constant_memory_args(mut self, args: Vec<(String, KernelArg)>) -> Self {
        self.constant_memory_args = args;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }
}
