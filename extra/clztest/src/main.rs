//! Compression test program
//!
//! This application is for testing purposes only and is not intended for
//! practical use

use clz::{decode_bytes, encode_bytes};
use rand::Rng;
use std::time::Instant;

fn main() {
    let src_size = 0x10000;
    let mut rng = rand::rng();
    let inputs = [
        ("coin-flips", coin_flips(&mut rng, 0x55, 0x2a, src_size)),
        ("letters", random_letters(&mut rng, src_size)),
        ("phrases", phrase_salad(&mut rng, src_size)),
        ("runs", byte_runs(&mut rng, src_size)),
        ("ramps", stepping_ramps(&mut rng, src_size)),
    ];

    for (name, input) in &inputs {
        let time0 = Instant::now();
        let mut encoded = Vec::new();
        let times = 20;
        for _ in 0..times {
            encoded = encode_bytes(input).unwrap();
        }
        let enc_elapsed = time0.elapsed();

        let time0 = Instant::now();
        let mut decoded = Vec::new();
        for _ in 0..times {
            decoded = decode_bytes(&encoded).unwrap();
        }
        let dec_elapsed = time0.elapsed();

        assert_eq!(&decoded, input, "{name}: round trip mismatch");
        println!(
            "{name}: {:.03}kb -> {:.03}kb {:.02}%, encode {:.03}s decode {:.03}s",
            input.len() as f64 / 1024.0,
            encoded.len() as f64 / 1024.0,
            encoded.len() as f64 / input.len() as f64 * 100.0,
            enc_elapsed.as_secs_f64() / times as f64,
            dec_elapsed.as_secs_f64() / times as f64,
        );
    }
}

/// Two symbols, fair coin. The worst case for back-reference chaining
/// short of full random data.
fn coin_flips(rng: &mut impl Rng, a: u8, b: u8, limit: usize) -> Vec<u8> {
    (0..limit).map(|_| if rng.random() { a } else { b }).collect()
}

/// Uniform letters, a mid-entropy baseline.
fn random_letters(rng: &mut impl Rng, limit: usize) -> Vec<u8> {
    (0..limit).map(|_| rng.random_range(b'A'..=b'Z')).collect()
}

/// A few phrases repeated in random order; plays to the pair-repeat and
/// meta-pattern machinery.
fn phrase_salad(rng: &mut impl Rng, limit: usize) -> Vec<u8> {
    const PHRASES: [&[u8]; 4] = [b"wind and rain ", b"rain again ", b"dry spell ", b"wind "];
    let mut v = Vec::with_capacity(limit + 16);
    while v.len() < limit {
        v.extend_from_slice(PHRASES[rng.random_range(0..PHRASES.len())]);
    }
    v.truncate(limit);
    v
}

/// Short runs of identical bytes; plays to the character-repeat markers.
fn byte_runs(rng: &mut impl Rng, limit: usize) -> Vec<u8> {
    let mut v = Vec::with_capacity(limit + 32);
    while v.len() < limit {
        let byte = rng.random_range(0..96u8);
        let len = rng.random_range(1..=24);
        v.resize(v.len() + len, byte);
    }
    v.truncate(limit);
    v
}

/// Ascending and descending arithmetic progressions; plays to the
/// stepping-run markers.
fn stepping_ramps(rng: &mut impl Rng, limit: usize) -> Vec<u8> {
    let mut v = Vec::with_capacity(limit + 16);
    while v.len() < limit {
        let mut value = rng.random_range(0..64i32);
        let step = [-3, -2, -1, 1, 2, 3][rng.random_range(0..6)];
        for _ in 0..rng.random_range(4..20) {
            v.push(value.rem_euclid(128) as u8);
            value += step;
        }
    }
    v.truncate(limit);
    v
}
