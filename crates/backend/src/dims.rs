//! Launch dimension types shared by the core and the backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Work-items per work-group in each dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDim {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl BlockDim {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total work-items per work-group.
    pub fn count(&self) -> usize {
        self.x * self.y * self.z
    }
}

impl fmt::Display for BlockDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Work-groups per dimension of the launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDim {
    pub x: usize,
    pub y: usize,
}

impl GridDim {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}
