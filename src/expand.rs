//! Expand pass
//!
//! Inverts the shrink pass over one wire block: replays repeat markers and
//! stepping runs, substitutes special markers from the table at the block's
//! end (extra-specials expand to two pairs each, shifting the tail), and
//! records where every marker pair begins. The recorded pair offsets, not a
//! re-scan of the expanded bytes, are what the decoder walks - bytes
//! produced by run expansion may carry the high bit without being markers.

use std::collections::{BTreeMap, BTreeSet};

use crate::DecodeError;
use crate::marker::{
    EXPAND_CAP, HIGH_FIVE_BITS, NIBBLE_ONE, NIBBLE_TWO, SPECIAL_MARKER, SPECIAL_NSTEPS, StepRun,
    is_marker, is_reserved_len, special_slot,
};

pub(crate) struct Expanded {
    pub bytes: Vec<u8>,
    /// Offsets in `bytes` where a marker pair begins, ascending.
    pub pair_offsets: Vec<usize>,
}

pub(crate) fn expand_block(chunk: &[u8]) -> Result<Expanded, DecodeError> {
    let mut buf = [0u8; EXPAND_CAP];
    let mut length = 0usize;
    let mut num_specials = 0usize;
    let mut last_ch = 0u8;
    let mut had_marker = false;
    let mut process_steps = false;
    let mut back_refs: BTreeSet<usize> = BTreeSet::new();
    let mut specials: BTreeMap<usize, usize> = BTreeMap::new();

    let at = |set: &BTreeSet<usize>, pos: usize| set.contains(&pos);

    for &ch in chunk {
        if process_steps {
            process_steps = false;
            let nibbles = ((ch & NIBBLE_ONE) >> 4) + 1;
            let num_repeats = (ch & NIBBLE_TWO) as usize;
            if num_repeats > 0 {
                if nibbles > 2 {
                    return Err(DecodeError::Invalid("unsupported stepping width"));
                }
                if length < nibbles as usize {
                    return Err(DecodeError::Invalid("stepping run before any data"));
                }
                let run = StepRun::from_seed(nibbles, &buf[..length])
                    .ok_or(DecodeError::Invalid("stepping run before any data"))?;
                if length + num_repeats > EXPAND_CAP {
                    return Err(DecodeError::Invalid("stepping run overflows block"));
                }
                for _ in 0..num_repeats {
                    let next = run
                        .next_value(buf[length - 1])
                        .ok_or(DecodeError::Invalid("stepping run out of range"))?;
                    buf[length] = next;
                    length += 1;
                }
            }
            continue;
        }

        if had_marker {
            // everything after the extra-specials sentinel is table data
            if length >= EXPAND_CAP {
                return Err(DecodeError::Invalid("block overflows"));
            }
            buf[length] = ch;
            length += 1;
            continue;
        }

        if ch & HIGH_FIVE_BITS == HIGH_FIVE_BITS && !at(&back_refs, length.wrapping_sub(1)) {
            if ch == SPECIAL_MARKER {
                had_marker = true;
                continue;
            }
            if ch == SPECIAL_NSTEPS {
                process_steps = true;
                continue;
            }
            // special marker: reserve the pair's two bytes for substitution
            if length + 2 > EXPAND_CAP {
                return Err(DecodeError::Invalid("block overflows"));
            }
            let slot = special_slot(ch);
            specials.insert(length, slot);
            if slot + 1 > num_specials {
                num_specials = slot + 1;
            }
            length += 2;
            continue;
        }

        if is_marker(ch)
            && !at(&back_refs, length.wrapping_sub(1))
            && (!is_reserved_len(ch)
                || at(&back_refs, length.wrapping_sub(2))
                || specials.contains_key(&length.wrapping_sub(2)))
        {
            back_refs.insert(length);
        }

        let mut was_expanded = false;
        if is_reserved_len(ch)
            && !at(&back_refs, length.wrapping_sub(1))
            && !at(&back_refs, length.wrapping_sub(2))
            && !specials.contains_key(&length.wrapping_sub(2))
        {
            was_expanded = true;
            let count = (ch - NIBBLE_ONE) as usize + 1;
            if length + count > EXPAND_CAP {
                return Err(DecodeError::Invalid("repeat run overflows block"));
            }
            for _ in 0..count {
                buf[length] = last_ch;
                length += 1;
            }
        }
        last_ch = ch;
        if !was_expanded {
            if length >= EXPAND_CAP {
                return Err(DecodeError::Invalid("block overflows"));
            }
            buf[length] = ch;
            length += 1;
        }
    }

    if process_steps {
        return Err(DecodeError::Truncated("stepping run missing its count byte"));
    }

    let mut pair_offsets: Vec<usize> = back_refs.into_iter().collect();

    if num_specials > 0 {
        if length < num_specials * 2 {
            return Err(DecodeError::Truncated("specials table"));
        }
        let table_at = length - num_specials * 2;
        let special_pairs: Vec<(u8, u8)> = (0..num_specials)
            .map(|k| (buf[table_at + 2 * k], buf[table_at + 2 * k + 1]))
            .collect();
        length = table_at;
        pair_offsets.retain(|&o| o < table_at);

        let mut already = 0usize;
        for (&offset0, &slot) in &specials {
            let offset = offset0 + already;
            if offset + 2 > length || offset + 2 > EXPAND_CAP {
                return Err(DecodeError::Invalid("special marker inside the table"));
            }
            if slot >= special_pairs.len() {
                return Err(DecodeError::Truncated("special slot has no table entry"));
            }
            let (a, b) = special_pairs[slot];
            if a & HIGH_FIVE_BITS == SPECIAL_MARKER {
                // extra-special: two slot indices expanding to two pairs
                let first = special_slot(a);
                let second = special_slot(b);
                if first >= special_pairs.len() || second >= special_pairs.len() {
                    return Err(DecodeError::Truncated("special slot has no table entry"));
                }
                if length + 2 > EXPAND_CAP {
                    return Err(DecodeError::Invalid("block overflows"));
                }
                buf.copy_within(offset..length, offset + 2);
                length += 2;
                already += 2;
                for o in pair_offsets.iter_mut() {
                    if *o >= offset {
                        *o += 2;
                    }
                }
                let (a1, b1) = special_pairs[first];
                let (a2, b2) = special_pairs[second];
                buf[offset] = a1;
                buf[offset + 1] = b1;
                buf[offset + 2] = a2;
                buf[offset + 3] = b2;
                pair_offsets.push(offset);
                pair_offsets.push(offset + 2);
            } else {
                buf[offset] = a;
                buf[offset + 1] = b;
                pair_offsets.push(offset);
            }
        }
        pair_offsets.sort_unstable();
    }

    Ok(Expanded { bytes: buf[..length].to_vec(), pair_offsets })
}
