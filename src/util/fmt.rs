//! Human-readable renderings of compiler data structures, for tests and tools.

pub mod tree;
