//! Chunked LZ compression codec
//!
//! A lossless byte-stream codec combining back-references over the current
//! block with several shrink passes: simple character repeats, stepping
//! nibble runs, frequent-pair "specials" and recursive meta-patterns.
//! Data flows through independent blocks of at most
//! [`MAX_ENCODED_BLOCK_SIZE`] encoded bytes, so decoding never needs random
//! access beyond the block at hand.
//!
//! Encoded literals are 7-bit; the high bit of every encoded byte marks the
//! start of a two-byte marker. Input bytes with the high bit set therefore
//! survive the round trip only where a back-reference or a stepping run can
//! carry them.

use std::io;

mod decode;
mod encode;
mod expand;
mod marker;
mod pattern;
mod shrink;

pub use decode::{decode, decode_bytes};
pub use encode::{encode, encode_bytes};

/// Maximum encoded size of one block on the wire.
pub const MAX_ENCODED_BLOCK_SIZE: usize = marker::MAX_ENCODED;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The output block outgrew its fixed buffer. This indicates a bug in
    /// the encoder, not bad input.
    #[error("encoded block exceeded its buffer")]
    BlockOverflow,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("truncated block: {0}")]
    Truncated(&'static str),
    #[error("invalid block data: {0}")]
    Invalid(&'static str),
}
