//! Backend selection and per-language constant rendering.

use crate::device::DeviceBackend;
use crate::error::BackendError;
use crate::wgsl::WgslBackend;
use gridtune_space::ParamValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which execution target a kernel source is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Accelerator-API kernels (`__global__` entry points).
    Cuda,
    /// Compute-API kernels (WGSL `@compute` entry points).
    Wgsl,
    /// Host-compiler code (plain C functions).
    Host,
}

impl BackendKind {
    /// Detect the kind from markers in the kernel source.
    pub fn detect(source: &str) -> Self {
        if source.contains("__global__") {
            BackendKind::Cuda
        } else if source.contains("@compute") {
            BackendKind::Wgsl
        } else {
            BackendKind::Host
        }
    }

    /// Render one compile-time constant definition in this kind's source
    /// language, without a trailing newline.
    pub fn define_line(&self, name: &str, value: &ParamValue) -> String {
        match self {
            BackendKind::Cuda | BackendKind::Host => format!("#define {name} {value}"),
            BackendKind::Wgsl => match value {
                ParamValue::Int(v) => format!("const {name}: i32 = {v};"),
                ParamValue::Bool(v) => format!("const {name}: bool = {v};"),
                ParamValue::Float(v) => {
                    // WGSL float literals need a decimal point.
                    if v.fract() == 0.0 {
                        format!("const {name}: f32 = {v:.1};")
                    } else {
                        format!("const {name}: f32 = {v};")
                    }
                }
            },
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cuda => write!(f, "cuda"),
            BackendKind::Wgsl => write!(f, "wgsl"),
            BackendKind::Host => write!(f, "host"),
        }
    }
}

/// Open the backend for `kind` on device `device`.
///
/// Only the wgpu compute backend is embedded in this crate; the accelerator
/// and host-compiler kinds are external collaborators and report
/// `Unsupported` here.
pub fn create_backend(
    kind: BackendKind,
    device: usize,
) -> Result<Box<dyn DeviceBackend>, BackendError> {
    match kind {
        BackendKind::Wgsl => Ok(Box::new(WgslBackend::new(device)?)),
        BackendKind::Cuda => Err(BackendError::Unsupported {
            operation: "cuda kernels".into(),
            backend: "embedded",
        }),
        BackendKind::Host => Err(BackendError::Unsupported {
            operation: "host-compiled kernels".into(),
            backend: "embedded",
        }),
    }
}
