//! Object instances
//!
//! Instances live in an `ObjectGraph` and are addressed by `ObjectId`
//! handles. The graph owns the instance data; parent/child edges and links
//! are expressed through properties and reference counts, never through Rust
//! ownership, so a handle can outlive the instance it names. Stale handles
//! are detected by a generation counter and reported as `InvalidObject`.

mod graph;
mod tree;

pub use graph::{GraphOptions, InterfaceRef, ObjectGraph};

use std::fmt;

/// Handle to an instance in an `ObjectGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}
