//! Synchronization for the object graph
//!
//! The object graph is a single-writer structure: every mutation takes
//! `&mut ObjectGraph`. `BigLock` provides the process-wide execution lock
//! that lets several threads share one graph under that discipline.

mod big_lock;

pub use big_lock::BigLock;
