//! Exhaustive auto-tuning of parameterized compute kernels.
//!
//! A common problem in GPU and vectorized host programming is that some
//! combination of work-group dimensions and other kernel parameters, like
//! tiling or unrolling factors, performs dramatically better than the rest.
//! This crate automates finding that combination: declare the tunable
//! parameters and their candidate values, and [`tune_kernel`] compiles and
//! benchmarks every configuration in the cartesian product, pruning
//! configurations that fail user restrictions or exceed device limits,
//! skipping configurations the device rejects for resource exhaustion, and
//! reporting the measured time of everything that ran.
//!
//! Each configuration's parameters are injected into the kernel source as
//! compile-time constants, so the tuned kernel can be used afterwards
//! without any dependency on this crate.
//!
//! ```no_run
//! use gridtune_space::ParameterDomain;
//! use gridtune_tuner::{tune_kernel, KernelArg, KernelInvocation, ProblemSize, TuneOptions};
//!
//! let source = r#"
//! @group(0) @binding(0) var<storage, read_write> c: array<f32>;
//! @group(0) @binding(1) var<storage, read> a: array<f32>;
//! @group(0) @binding(2) var<storage, read> b: array<f32>;
//! @group(0) @binding(3) var<uniform> n: u32;
//!
//! @compute @workgroup_size(block_size_x, 1, 1)
//! fn vector_add(@builtin(global_invocation_id) gid: vec3<u32>) {
//!     if (gid.x < n) {
//!         c[gid.x] = a[gid.x] + b[gid.x];
//!     }
//! }
//! "#;
//!
//! let size = 1_000_000usize;
//! let a = vec![1.0f32; size];
//! let b = vec![2.0f32; size];
//! let invocation = KernelInvocation::new(
//!     "vector_add",
//!     source,
//!     ProblemSize::new(size, 1),
//!     vec![
//!         KernelArg::Float32Buffer(vec![0.0; size]),
//!         KernelArg::Float32Buffer(a),
//!         KernelArg::Float32Buffer(b),
//!         KernelArg::Uint32(size as u32),
//!     ],
//! );
//! let domain = ParameterDomain::new().param("block_size_x", [64, 128, 192, 256]);
//! let results = tune_kernel(&invocation, &domain, &TuneOptions::default())?;
//! if let Some(best) = results.best() {
//!     println!("{} took {:.3} ms", best.instance, best.time_ms);
//! }
//! # anyhow::Ok(())
//! ```

pub mod benchmark;
pub mod error;
pub mod geometry;
pub mod options;
pub mod results;
pub mod specialize;
pub mod tuner;
pub mod verify;

pub use benchmark::*;
pub use error::*;
pub use geometry::*;
pub use options::*;
pub use results::*;
pub use specialize::*;
pub use tuner::*;
pub use verify::*;

pub use gridtune_backend::{
    create_backend, BackendError, BackendKind, BlockDim, DeviceArg, DeviceBackend, GridDim,
    KernelArg, KernelHandle, WgslBackend,
};
pub use gridtune_space::{
    check_restrictions, Configuration, ParamValue, ParameterDomain, RestrictionFailure,
};
