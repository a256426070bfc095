//! NPZ archive reading
//!
//! # Module Structure
//!
//! - `archive`: zip container access, member lookup by array name
//! - `npy`: NPY header parsing (magic, version, dtype, shape)

pub mod archive;
pub mod npy;

pub use archive::NpzArchive;
pub use npy::{ByteOrder, Dtype, DtypeKind, NpyArray};
