//! Numeric helpers shared by clustering and peer search

pub mod vector_ops;

pub use vector_ops::VectorOps;
