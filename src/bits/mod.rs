//! Variable-length integer coding and bit-packed integer arrays.
//!
//! These are the two primitives every other bref4 module builds on: markers
//! delta-encode their position with [`restricted_int`], and every map /
//! allele-index array on the wire is a [`packed_array::IndexArray`].

pub mod packed_array;
pub mod restricted_int;

pub use packed_array::IndexArray;
pub use restricted_int::{read_restricted_int, write_restricted_int};
