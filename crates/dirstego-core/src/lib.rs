//! dirstego-core
//!
//! The steganographic container format at the heart of `dirstego`: embed a
//! directory tree across a set of lossless PNG cover images, one LSB per
//! RGB channel sample, and reconstruct it bit-exactly.
//!
//! - [`bits`] — C1, integer/byte/bit conversions.
//! - [`tree`] — C2, directory tree serialization.
//! - [`pixels`] — C3, the per-image LSB pixel cursor.
//! - [`container`] — C4, per-image header framing.
//! - [`codec`] — C5, the encoder/decoder that ties the others together.

pub mod bits;
pub mod codec;
pub mod container;
pub mod error;
pub mod pixels;
pub mod tree;

pub use codec::{commit_encode, decode, encode, human_readable_size, plan_encode, EncodePlan, EncodeReport};
pub use error::{Result, StegoError};
pub use tree::Node;
