//! Device backends for gridtune.
//!
//! The tuning core talks to hardware exclusively through the
//! [`DeviceBackend`] trait; one concrete implementation is embedded here, a
//! wgpu compute backend for WGSL kernels.

pub mod args;
pub mod device;
pub mod dims;
pub mod error;
pub mod kind;
pub mod wgsl;

pub use args::*;
pub use device::*;
pub use dims::*;
pub use error::*;
pub use kind::*;
pub use wgsl::WgslBackend;
