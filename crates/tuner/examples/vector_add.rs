//! Tune a WGSL vector-add kernel over work-group sizes.
//!
//! Run with `RUST_LOG=info cargo run --example vector_add` (needs a GPU
//! adapter).

use anyhow::Result;
use gridtune_space::ParameterDomain;
use gridtune_tuner::{tune_kernel, KernelArg, KernelInvocation, ProblemSize, TuneOptions};
use tracing_subscriber::EnvFilter;

const KERNEL_SOURCE: &str = r#"
@group(0) @binding(0) var<storage, read_write> c: array<f32>;
@group(0) @binding(1) var<storage, read> a: array<f32>;
@group(0) @binding(2) var<storage, read> b: array<f32>;
@group(0) @binding(3) var<uniform> n: u32;

@compute @workgroup_size(block_size_x, 1, 1)
fn vector_add(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < n) {
        c[gid.x] = a[gid.x] + b[gid.x];
    }
}
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let size = 1 << 20;
    fastrand::seed(12345);
    let a: Vec<f32> = (0..size).map(|_| fastrand::f32() * 2.0 - 1.0).collect();
    let b: Vec<f32> = (0..size).map(|_| fastrand::f32() * 2.0 - 1.0).collect();
    let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();

    let invocation = KernelInvocation::new(
        "vector_add",
        KERNEL_SOURCE,
        ProblemSize::new(size, 1),
        vec![
            KernelArg::Float32Buffer(vec![0.0; size]),
            KernelArg::Float32Buffer(a),
            KernelArg::Float32Buffer(b),
            KernelArg::Uint32(size as u32),
        ],
    );
    let domain = ParameterDomain::new().param("block_size_x", [64, 128, 192, 256]);
    let options = TuneOptions::default()
        .with_answer(vec![Some(KernelArg::Float32Buffer(expected)), None, None, None])
        .with_verbose(true);

    let results = tune_kernel(&invocation, &domain, &options)?;
    for record in results.iter() {
        println!("{} took {:.4} ms", record.params, record.time_ms);
    }
    match results.best() {
        Some(best) => println!(
            "best performing configuration: {} took {:.4} ms",
            best.instance, best.time_ms
        ),
        None => println!("no results to report"),
    }
    Ok(())
}
