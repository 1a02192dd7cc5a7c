//! Kernel argument types.

use serde::{Deserialize, Serialize};

/// A host-side kernel argument: a dense typed buffer or a scalar.
///
/// Argument order is significant and fixed across all configurations of a
/// sweep; it must match the binding order declared in the kernel source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelArg {
    Float32Buffer(Vec<f32>),
    Int32Buffer(Vec<i32>),
    Uint32Buffer(Vec<u32>),
    Float32(f32),
    Int32(i32),
    Uint32(u32),
}

impl KernelArg {
    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            KernelArg::Float32Buffer(_) | KernelArg::Int32Buffer(_) | KernelArg::Uint32Buffer(_)
        )
    }

    /// Number of elements (1 for scalars).
    pub fn element_count(&self) -> usize {
        match self {
            KernelArg::Float32Buffer(v) => v.len(),
            KernelArg::Int32Buffer(v) => v.len(),
            KernelArg::Uint32Buffer(v) => v.len(),
            _ => 1,
        }
    }

    /// Size of the argument's data in bytes; every element type is 4 bytes.
    pub fn size_bytes(&self) -> usize {
        self.element_count() * 4
    }

    /// An argument of the same shape and type with all elements zero.
    pub fn zeros_like(&self) -> KernelArg {
        match self {
            KernelArg::Float32Buffer(v) => KernelArg::Float32Buffer(vec![0.0; v.len()]),
            KernelArg::Int32Buffer(v) => KernelArg::Int32Buffer(vec![0; v.len()]),
            KernelArg::Uint32Buffer(v) => KernelArg::Uint32Buffer(vec![0; v.len()]),
            KernelArg::Float32(_) => KernelArg::Float32(0.0),
            KernelArg::Int32(_) => KernelArg::Int32(0),
            KernelArg::Uint32(_) => KernelArg::Uint32(0),
        }
    }

    /// Element-wise comparison within an absolute tolerance.
    ///
    /// Float data compares within `atol`; integer data compares exactly.
    /// Mismatched variants or lengths never compare equal.
    pub fn allclose(&self, other: &KernelArg, atol: f64) -> bool {
        match (self, other) {
            (KernelArg::Float32Buffer(a), KernelArg::Float32Buffer(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| ((x - y).abs() as f64) <= atol)
            }
            (KernelArg::Int32Buffer(a), KernelArg::Int32Buffer(b)) => a == b,
            (KernelArg::Uint32Buffer(a), KernelArg::Uint32Buffer(b)) => a == b,
            (KernelArg::Float32(a), KernelArg::Float32(b)) => ((a - b).abs() as f64) <= atol,
            (KernelArg::Int32(a), KernelArg::Int32(b)) => a == b,
            (KernelArg::Uint32(a), KernelArg::Uint32(b)) => a == b,
            _ => false,
        }
    }
}

/// A staged kernel argument as seen by the core: an opaque handle into the
/// backend's device storage for buffers, or the scalar passed through.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceArg {
    Buffer { slot: usize, size_bytes: usize },
    Scalar(KernelArg),
}

/// Opaque handle to a kernel compiled by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelHandle(pub usize);
