//! Little-endian value readers and writers.
//!
//! The wire protocol and the tile store pin every multi-byte integer to
//! little-endian and every floating-point value to IEEE-754 binary64. These
//! two types are the only place that byte order appears in the codebase.

mod value_reader;
mod value_writer;

pub use value_reader::ValueReader;
pub use value_writer::ValueWriter;
