//! The tuning orchestrator.

use crate::benchmark::BenchmarkRunner;
use crate::error::TuneError;
use crate::geometry::{grid_dimensions, thread_block_dimensions, ProblemSize};
use crate::options::TuneOptions;
use crate::results::{TuningRecord, TuningResults};
use crate::specialize::{rename_kernel, specialize_kernel, unique_kernel_name};
use crate::verify::check_kernel_correctness;
use anyhow::{Context, Result};
use gridtune_backend::{
    create_backend, BackendKind, BlockDim, DeviceArg, DeviceBackend, GridDim, KernelArg,
    KernelHandle,
};
use gridtune_space::{check_restrictions, Configuration, ParameterDomain};
use std::fmt;
use tracing::{debug, info};

/// One kernel plus the inputs shared by every configuration of a sweep.
#[derive(Debug, Clone)]
pub struct KernelInvocation {
    /// Name of the kernel entry point as declared in the source.
    pub kernel_name: String,
    /// The kernel source text; treated as opaque.
    pub kernel_source: String,
    /// Logical problem extent the grid dimensions are derived from.
    pub problem_size: ProblemSize,
    /// Kernel arguments in declaration order.
    pub arguments: Vec<KernelArg>,
}

impl KernelInvocation {
    pub fn new(
        kernel_name: impl Into<String>,
        kernel_source: impl Into<String>,
        problem_size: ProblemSize,
        arguments: Vec<KernelArg>,
    ) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            kernel_source: kernel_source.into(),
            problem_size,
            arguments,
        }
    }
}

/// Drives a sweep against one device backend.
///
/// The backend is opened once and held for the tuner's lifetime; all
/// compilation, staging, and benchmarking runs sequentially against it.
pub struct Tuner {
    backend: Box<dyn DeviceBackend>,
    kind: BackendKind,
}

impl Tuner {
    /// Open the backend selected by `options.lang`, or detected from the
    /// kernel source when no override is given.
    pub fn for_source(kernel_source: &str, options: &TuneOptions) -> Result<Self> {
        let kind = options
            .lang
            .unwrap_or_else(|| BackendKind::detect(kernel_source));
        let backend = create_backend(kind, options.device)
            .with_context(|| format!("failed to open the {kind} backend"))?;
        Ok(Self { backend, kind })
    }

    /// Use an externally constructed backend (embedders, tests).
    pub fn with_backend(kind: BackendKind, backend: Box<dyn DeviceBackend>) -> Self {
        Self { backend, kind }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Sweep the full parameter space: enumerate, prune, then specialize,
    /// compile, optionally verify, and benchmark every surviving
    /// configuration. Returns the table of measured configurations; an empty
    /// table means everything was pruned or skipped and is not an error.
    pub fn tune(
        &mut self,
        invocation: &KernelInvocation,
        domain: &ParameterDomain,
        options: &TuneOptions,
    ) -> Result<TuningResults> {
        domain.validate().map_err(TuneError::from)?;
        if let Some(answer) = &options.answer {
            if answer.len() != invocation.arguments.len() {
                return Err(TuneError::AnswerLength {
                    answers: answer.len(),
                    arguments: invocation.arguments.len(),
                }
                .into());
            }
        }

        let max_threads = self.backend.max_threads();
        if let Some(total) = domain.cardinality() {
            info!(
                kernel = %invocation.kernel_name,
                backend = self.backend.name(),
                configurations = total,
                max_threads,
                "starting sweep"
            );
        }

        let device_args = self
            .backend
            .ready_argument_list(&invocation.arguments)
            .context("failed to stage kernel arguments")?;

        let mut results = TuningResults::new();
        for config in domain.configurations() {
            let instance = config.instance_string();

            if let Err(reason) = check_restrictions(&options.restrictions, &config) {
                log_skip(options.verbose, &instance, &reason);
                continue;
            }

            let threads = thread_block_dimensions(&config)
                .with_context(|| format!("configuration {instance}"))?;
            if threads.count() > max_threads {
                log_skip(options.verbose, &instance, &"too many threads per block");
                continue;
            }
            let grid = grid_dimensions(
                invocation.problem_size,
                &config,
                options.grid_div_x.as_deref(),
                options.grid_div_y.as_deref(),
            )
            .with_context(|| format!("configuration {instance}"))?;

            // A per-configuration kernel name defeats backend compilation
            // caching: every configuration is its own compilation unit.
            let name = unique_kernel_name(&invocation.kernel_name, &config);
            let source = specialize_kernel(&invocation.kernel_source, &config, grid, self.kind);
            let source = rename_kernel(&source, &invocation.kernel_name, &name);

            let kernel = match self.backend.compile(&name, &source) {
                Ok(kernel) => kernel,
                Err(err) if err.is_recoverable() => {
                    log_skip(options.verbose, &instance, &err);
                    continue;
                }
                Err(source) => return Err(TuneError::Backend { instance, source }.into()),
            };

            if !options.constant_memory_args.is_empty() {
                self.backend
                    .copy_constant_memory_args(&options.constant_memory_args)
                    .map_err(|source| TuneError::Backend {
                        instance: instance.clone(),
                        source,
                    })?;
            }

            let measured = verify_and_benchmark(
                self.backend.as_mut(),
                kernel,
                &device_args,
                threads,
                grid,
                options,
                &instance,
            );
            let time_ms = match measured {
                Ok(time_ms) => time_ms,
                Err(TuneError::Backend { source, .. }) if source.is_recoverable() => {
                    log_skip(options.verbose, &instance, &source);
                    continue;
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("error while benchmarking configuration {instance}")))
                }
            };

            info!(params = %config, time_ms, "benchmarked configuration");
            results.push(TuningRecord {
                instance,
                params: config,
                time_ms,
            });
        }

        match results.best() {
            Some(best) => info!(
                config = %best.instance,
                time_ms = best.time_ms,
                "best performing configuration"
            ),
            None => info!("no results to report"),
        }
        Ok(results)
    }

    /// Compile and run the kernel once for a single configuration and return
    /// the post-execution host-side argument values. Intended for one-shot
    /// correctness checks outside a sweep; the kernel keeps its declared
    /// name and no pruning is applied.
    pub fn run_once(
        &mut self,
        invocation: &KernelInvocation,
        config: &Configuration,
        options: &TuneOptions,
    ) -> Result<Vec<KernelArg>> {
        let instance = config.instance_string();
        let device_args = self
            .backend
            .ready_argument_list(&invocation.arguments)
            .context("failed to stage kernel arguments")?;

        let threads = thread_block_dimensions(config)?;
        let grid = grid_dimensions(
            invocation.problem_size,
            config,
            options.grid_div_x.as_deref(),
            options.grid_div_y.as_deref(),
        )?;
        let source = specialize_kernel(&invocation.kernel_source, config, grid, self.kind);

        let kernel = self
            .backend
            .compile(&invocation.kernel_name, &source)
            .map_err(|source| TuneError::Backend {
                instance: instance.clone(),
                source,
            })?;
        if !options.constant_memory_args.is_empty() {
            self.backend
                .copy_constant_memory_args(&options.constant_memory_args)
                .map_err(|source| TuneError::Backend {
                    instance: instance.clone(),
                    source,
                })?;
        }
        self.backend
            .run_kernel(kernel, &device_args, threads, grid)
            .map_err(|source| TuneError::Backend {
                instance: instance.clone(),
                source,
            })?;

        let mut host = Vec::with_capacity(invocation.arguments.len());
        for (arg, staged) in invocation.arguments.iter().zip(&device_args) {
            if arg.is_buffer() {
                let mut dest = arg.zeros_like();
                self.backend
                    .memcpy_dtoh(&mut dest, staged)
                    .map_err(|source| TuneError::Backend {
                        instance: instance.clone(),
                        source,
                    })?;
                host.push(dest);
            } else {
                host.push(arg.clone());
            }
        }
        Ok(host)
    }
}

/// Tune a kernel over a parameter space, selecting the backend from the
/// source text (or `options.lang`).
pub fn tune_kernel(
    invocation: &KernelInvocation,
    domain: &ParameterDomain,
    options: &TuneOptions,
) -> Result<TuningResults> {
    let mut tuner = Tuner::for_source(&invocation.kernel_source, options)?;
    tuner.tune(invocation, domain, options)
}

/// Compile and run a kernel once for a single configuration.
pub fn run_kernel(
    invocation: &KernelInvocation,
    config: &Configuration,
    options: &TuneOptions,
) -> Result<Vec<KernelArg>> {
    let mut tuner = Tuner::for_source(&invocation.kernel_source, options)?;
    tuner.run_once(invocation, config, options)
}

fn verify_and_benchmark(
    backend: &mut dyn DeviceBackend,
    kernel: KernelHandle,
    args: &[DeviceArg],
    threads: BlockDim,
    grid: GridDim,
    options: &TuneOptions,
    instance: &str,
) -> Result<f64, TuneError> {
    if let Some(answer) = &options.answer {
        check_kernel_correctness(
            backend,
            kernel,
            args,
            threads,
            grid,
            answer,
            options.atol,
            instance,
        )?;
    }
    BenchmarkRunner::new(options.iterations)
        .measure(backend, kernel, args, threads, grid)
        .map_err(|source| TuneError::Backend {
            instance: instance.to_string(),
            source,
        })
}

fn log_skip(verbose: bool, instance: &str, reason: &dyn fmt::Display) {
    if verbose {
        info!(config = %instance, %reason, "skipping configuration");
    } else {
        debug!(config = %instance, %reason, "skipping configuration");
    }
}
