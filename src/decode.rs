//! Decoder driver
//!
//! Reads the stream in blocks of exactly [`MAX_ENCODED`] bytes (a short
//! read marks the final block), expands each block, then walks the marker
//! pairs from last to first. A pair-repeat marker carries its count to the
//! next (earlier) pair; every other pair expands recursively: a referent
//! that itself starts with a marker byte is split into its leading pair
//! and its tail - or, when the tail is a repeat marker, replayed that many
//! times.

use std::collections::VecDeque;
use std::io::{Read, Write};

use crate::DecodeError;
use crate::expand::expand_block;
use crate::marker::{
    MAX_ENCODED, MIN_PAT_LEN, back_ref_target, is_marker, is_reserved_len, repeat_pair_count,
};

/// Decode a compressed stream back to the original bytes, reading to end
/// of stream.
pub fn decode<R: Read, W: Write>(mut input: R, output: &mut W) -> Result<(), DecodeError> {
    let mut chunk = vec![0u8; MAX_ENCODED];
    loop {
        let got = read_full(&mut input, &mut chunk)?;
        if got == 0 {
            break;
        }
        decode_block(&chunk[..got], output)?;
        if got < MAX_ENCODED {
            break;
        }
    }
    Ok(())
}

/// Decode a compressed byte slice.
pub fn decode_bytes(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    decode(input, &mut out)?;
    Ok(out)
}

fn read_full<R: Read>(input: &mut R, chunk: &mut [u8]) -> Result<usize, DecodeError> {
    let mut got = 0;
    while got < chunk.len() {
        let n = input.read(&mut chunk[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    Ok(got)
}

fn decode_block(chunk: &[u8], output: &mut impl Write) -> Result<(), DecodeError> {
    let expanded = expand_block(chunk)?;
    let buf = &expanded.bytes;
    let n = buf.len();
    if n == 0 {
        return Ok(());
    }
    if n <= MIN_PAT_LEN || expanded.pair_offsets.is_empty() {
        output.write_all(buf)?;
        return Ok(());
    }

    let pairs = &expanded.pair_offsets;
    let mut outputs: VecDeque<Vec<u8>> = VecDeque::new();
    let mut idx = pairs.len() - 1;
    let mut num_repeats = 0usize;
    let mut next_offset = pairs[idx];
    let mut last_offset;

    // bytes after the last marker pair come out last
    if next_offset + 2 < n {
        outputs.push_back(buf[next_offset + 2..n].to_vec());
    }
    loop {
        if next_offset + 2 > n {
            return Err(DecodeError::Truncated("marker pair"));
        }
        let hi = buf[next_offset];
        let lo = buf[next_offset + 1];
        if is_reserved_len(hi) {
            num_repeats = repeat_pair_count(hi, lo);
        } else {
            let pattern = expand_meta_pattern(&[hi, lo], buf, 0)?;
            let mut expansion = Vec::with_capacity(pattern.len() * (num_repeats + 1));
            for _ in 0..=num_repeats {
                expansion.extend_from_slice(&pattern);
            }
            outputs.push_front(expansion);
            num_repeats = 0;
        }
        last_offset = next_offset;
        if idx == 0 {
            break;
        }
        idx -= 1;
        next_offset = pairs[idx];
        if next_offset + 2 < last_offset {
            outputs.push_front(buf[next_offset + 2..last_offset].to_vec());
        }
    }
    if last_offset != 0 {
        output.write_all(&buf[..last_offset])?;
    }
    for part in &outputs {
        output.write_all(part)?;
    }
    Ok(())
}

/// Recursively expand a two-byte back-ref against the expanded block.
/// The referent is either plain bytes (returned as they are), a pair plus
/// a repeat count, or a pair followed by more bytes which expand on their
/// own.
fn expand_meta_pattern(meta: &[u8], buf: &[u8], depth: usize) -> Result<Vec<u8>, DecodeError> {
    if depth > MAX_ENCODED {
        return Err(DecodeError::Invalid("meta-pattern reference cycle"));
    }
    if meta.len() < 2 || !is_marker(meta[0]) {
        return Ok(meta.to_vec());
    }
    let (offset, length) = back_ref_target(meta[0], meta[1]);
    if offset + length > buf.len() {
        return Err(DecodeError::Invalid("back-reference outside the block"));
    }
    let pattern = &buf[offset..offset + length];
    if !is_marker(pattern[0]) || pattern.len() < 3 {
        return Ok(pattern.to_vec());
    }
    if is_reserved_len(pattern[2]) {
        // pair plus repeat: replay the pair's expansion
        let stored_lo = if pattern.len() > 3 { pattern[3] } else { 0 };
        let repeats = repeat_pair_count(pattern[2], stored_lo);
        let head = expand_meta_pattern(&pattern[..2], buf, depth + 1)?;
        let mut out = Vec::with_capacity(head.len() * (repeats + 1));
        for _ in 0..=repeats {
            out.extend_from_slice(&head);
        }
        Ok(out)
    } else {
        let mut out = expand_meta_pattern(&pattern[..2], buf, depth + 1)?;
        out.extend(expand_meta_pattern(&pattern[2..], buf, depth + 1)?);
        Ok(out)
    }
}
