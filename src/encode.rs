//! Encoder driver
//!
//! Reads the input a byte at a time into a small lookahead window, finds
//! greedy earliest-longest matches against the output block built so far,
//! and emits literals or two-byte back-refs. A freshly encoded back-ref is
//! pushed back into the front of the lookahead so further matches can chain
//! off it; identical consecutive back-refs collapse into a pair-repeat
//! marker. Whenever the block fills up it is written out and every block
//! dictionary starts over.
//!
//! Non-final blocks occupy exactly [`MAX_ENCODED`] bytes on the wire (the
//! decoder frames blocks by fixed-size reads), padded with no-op stepping
//! pairs; only the final block runs the shrink pass, and only when the
//! expand pass verifiably inverts it.

use std::io::{Read, Write};

use crate::EncodeError;
use crate::marker::{
    self, MAX_ENCODED, MAX_OFFSET, MAX_PAT_LEN, MAX_REPEATS, MIN_PAT_LEN, SPECIAL_MARKER,
    SPECIAL_NSTEPS, is_marker, is_reserved_len,
};
use crate::pattern::{Block, perform_meta_combines, replace_extra_pattern, replace_meta_pattern};
use crate::{expand, shrink};

/// Encode `input` to its compressed form on `output`, reading to end of
/// stream.
pub fn encode<R: Read, W: Write>(input: R, output: &mut W) -> Result<(), EncodeError> {
    let mut encoder = Encoder::new();
    let mut bytes = input.bytes();
    let mut done = false;
    while !done {
        done = encoder.run(&mut bytes, output)?;
    }
    encoder.finish(output)
}

/// Encode a byte slice, returning the compressed bytes.
pub fn encode_bytes(input: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    encode(input, &mut out)?;
    Ok(out)
}

struct Encoder {
    block: Block,
    /// Lookahead window; an injected back-ref pair may sit at the front.
    look: [u8; MAX_PAT_LEN + 2],
    num: usize,
    /// Whether `look[0..2]` holds an injected back-ref pair.
    injected: bool,
    last_pair: (u8, u8),
    last_pair_repeats: usize,
    last_back_ref_offset: usize,
    input_done: bool,
}

impl Encoder {
    fn new() -> Self {
        Encoder {
            block: Block::new(),
            look: [0; MAX_PAT_LEN + 2],
            num: 0,
            injected: false,
            last_pair: (0, 0),
            last_pair_repeats: 0,
            last_back_ref_offset: 0,
            input_done: false,
        }
    }

    fn push_pair_bytes(&mut self, hi: u8, lo: u8) -> Result<(), EncodeError> {
        let offset = self.block.offset;
        if offset + 2 > MAX_ENCODED {
            return Err(EncodeError::BlockOverflow);
        }
        self.block.pairs.insert(offset);
        self.block.buf[offset] = hi;
        self.block.buf[offset + 1] = lo;
        self.block.offset = offset + 2;
        Ok(())
    }

    fn push_literals(&mut self, count: usize) -> Result<(), EncodeError> {
        let offset = self.block.offset;
        if offset + count > MAX_ENCODED {
            return Err(EncodeError::BlockOverflow);
        }
        if self.injected {
            self.block.pairs.insert(offset);
        }
        self.block.buf[offset..offset + count].copy_from_slice(&self.look[..count]);
        self.block.offset = offset + count;
        Ok(())
    }

    fn consume(&mut self, count: usize) {
        if self.num > count {
            self.look.copy_within(count..self.num, 0);
        }
        self.num -= count;
        self.injected = false;
    }

    /// Emit the pending pair-repeat marker, folding it into a meta-pattern
    /// when the last back-ref admits one.
    fn flush_repeat(&mut self) -> Result<(), EncodeError> {
        if self.last_pair_repeats == 0 {
            return Ok(());
        }
        let mut pair = marker::repeat_pair(self.last_pair_repeats);
        self.last_pair_repeats = 0;
        if !replace_meta_pattern(&mut self.block, self.last_back_ref_offset, &mut pair) {
            self.push_pair_bytes(pair.0, pair.1)?;
        }
        Ok(())
    }

    fn combine(&mut self) {
        let mut lbro = self.last_back_ref_offset;
        if perform_meta_combines(&mut self.block, &mut lbro) {
            self.last_pair = (0, 0);
        }
        self.last_back_ref_offset = lbro;
    }

    /// Earliest longest match of the lookahead within the block built so
    /// far. An injected pair only matches at a genuine non-repeat pair
    /// start; anywhere else its decode-time meaning differs.
    fn search(&self) -> (usize, usize) {
        let mut length = 1usize;
        let mut offset = 0usize;
        let end = self.block.offset;

        let mut cap = MAX_OFFSET - 2;
        if self.injected {
            cap -= 2;
        }
        let searchable = !(self.injected && is_reserved_len(self.look[0]));
        if end < cap && searchable {
            for start in 0..=end - MIN_PAT_LEN {
                if self.injected && !self.block.is_pair_at(start) {
                    continue;
                }
                let mut i = 0;
                while i < self.num && start + i < end {
                    if self.block.buf[start + i] != self.look[i] {
                        break;
                    }
                    if i >= length {
                        length = i + 1;
                        offset = start;
                    }
                    i += 1;
                }
                if i == self.num {
                    length = self.num;
                    offset = start;
                    break;
                }
            }
        }
        if length == 1 && self.injected {
            length = 2;
        }
        (offset, length)
    }

    fn try_extra_pattern(&mut self, tail_len: usize) -> bool {
        if self.block.last_pattern_offset != self.block.offset.wrapping_sub(2)
            || is_marker(self.look[0])
        {
            return false;
        }
        let lpo = self.block.last_pattern_offset;
        let mut pattern = Vec::with_capacity(2 + tail_len);
        pattern.extend_from_slice(&self.block.buf[lpo..lpo + 2]);
        pattern.extend_from_slice(&self.look[..tail_len]);
        replace_extra_pattern(&mut self.block, &pattern)
    }

    /// One pass over the lookahead; returns true when the input is spent
    /// and the last bytes have been emitted.
    fn run<I>(&mut self, input: &mut I, output: &mut impl Write) -> Result<bool, EncodeError>
    where
        I: Iterator<Item = std::io::Result<u8>>,
    {
        // refill, stopping early when the block is nearly full
        while self.num < MAX_PAT_LEN && !self.input_done {
            match input.next() {
                None => {
                    self.input_done = true;
                    break;
                }
                Some(byte) => {
                    self.look[self.num] = byte?;
                    self.num += 1;
                }
            }
            let bytes_from_end = if self.injected { 3 } else { 1 };
            if self.block.offset + self.num >= MAX_OFFSET - bytes_from_end {
                break;
            }
        }
        if self.num == 0 {
            return Ok(true);
        }

        if self.num < MIN_PAT_LEN || self.block.offset < MIN_PAT_LEN {
            self.flush_repeat()?;
            self.last_pair = (0, 0);
            let mut was_extra = false;
            if self.num < MIN_PAT_LEN {
                was_extra = self.try_extra_pattern(self.num);
            }
            if !was_extra {
                self.push_literals(self.num.min(MIN_PAT_LEN))?;
            }
            if self.num < MIN_PAT_LEN {
                // only the end of the input terminates; a lookahead cut
                // short by the block-full guard keeps going so the block
                // can flush below
                if self.input_done {
                    return Ok(true);
                }
                self.num = 0;
                self.injected = false;
                self.maybe_flush_block(output)?;
                return Ok(false);
            }
            self.consume(MIN_PAT_LEN);
        }

        let (offset, length) = self.search();

        if length < MIN_PAT_LEN {
            if !self.injected {
                self.flush_repeat()?;
                self.last_pair = (0, 0);
            } else {
                self.last_back_ref_offset = self.block.offset;
            }
            let was_extra = self.try_extra_pattern(length);
            if !was_extra {
                self.push_literals(length)?;
            }
            self.consume(length);
            self.combine();
        } else {
            let (hi, lo) = marker::back_ref(offset, length);
            let mut same = (hi, lo) == self.last_pair;
            if self.last_pair_repeats > 0 && (!same || self.last_pair_repeats >= MAX_REPEATS) {
                self.flush_repeat()?;
                same = false;
                self.last_pair = (0, 0);
            }
            if same {
                self.last_pair_repeats += 1;
            }
            if self.last_pair_repeats == 0 {
                let mut pair = (hi, lo);
                let was_replaced = self.last_back_ref_offset != 0
                    && self.last_back_ref_offset == self.block.offset.wrapping_sub(2)
                    && replace_meta_pattern(&mut self.block, self.last_back_ref_offset, &mut pair);
                if was_replaced {
                    self.last_pair = (0, 0);
                    self.consume(length);
                } else {
                    // put the back-ref in front of the remaining lookahead
                    // so the next match can extend it
                    if length > 2 && self.num > length {
                        self.look.copy_within(length..self.num, 2);
                    }
                    self.look[0] = pair.0;
                    self.look[1] = pair.1;
                    self.last_pair = pair;
                    self.num += 2;
                    self.injected = true;
                    self.block.hold_reference(offset + length);
                    self.num -= length;
                }
            } else {
                self.consume(length);
            }
        }

        self.maybe_flush_block(output)?;
        Ok(false)
    }

    fn maybe_flush_block(&mut self, output: &mut impl Write) -> Result<(), EncodeError> {
        if self.block.offset < MAX_OFFSET {
            return Ok(());
        }
        self.flush_repeat()?;
        self.last_pair = (0, 0);
        self.combine();
        if self.block.offset < MAX_OFFSET {
            return Ok(());
        }
        // an injected pair still in the lookahead references this block;
        // it has to land here
        if self.injected {
            let (hi, lo) = (self.look[0], self.look[1]);
            self.push_pair_bytes(hi, lo)?;
            self.consume(2);
        }
        let body = &self.block.buf[..self.block.offset];
        let mut wire = Vec::with_capacity(MAX_ENCODED);
        wire.extend_from_slice(body);
        while MAX_ENCODED - wire.len() >= 2 {
            wire.push(SPECIAL_NSTEPS);
            wire.push(0x00);
        }
        if wire.len() < MAX_ENCODED {
            wire.push(SPECIAL_MARKER);
        }
        output.write_all(&wire)?;

        self.block.reset();
        self.last_pair = (0, 0);
        self.last_pair_repeats = 0;
        self.last_back_ref_offset = 0;
        Ok(())
    }

    /// Flush the residual block: pending repeat, final combines, then the
    /// shrink pass (committed only when the expand pass inverts it).
    fn finish(&mut self, output: &mut impl Write) -> Result<(), EncodeError> {
        self.flush_repeat()?;
        if self.block.offset == 0 {
            return Ok(());
        }
        self.combine();

        let length = self.block.offset;
        let original = self.block.buf[..length].to_vec();
        let shrunk = shrink::shrink_block(&mut self.block.buf[..], length);
        let committed = shrunk < length && {
            let pair_offsets: Vec<usize> =
                self.block.pairs.iter().copied().filter(|&p| p < length).collect();
            match expand::expand_block(&self.block.buf[..shrunk]) {
                Ok(expanded) => {
                    expanded.bytes == original && expanded.pair_offsets == pair_offsets
                }
                Err(_) => false,
            }
        };
        if committed {
            output.write_all(&self.block.buf[..shrunk])?;
        } else {
            output.write_all(&original)?;
        }
        self.block.reset();
        Ok(())
    }
}
