//! End-to-end round-trip coverage over the codec's 7-bit payload domain.

use clz::{MAX_ENCODED_BLOCK_SIZE, decode_bytes, encode_bytes};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn round_trip(data: &[u8]) {
    let enc = encode_bytes(data).unwrap();
    let dec = decode_bytes(&enc).unwrap();
    assert_eq!(dec, data, "round trip failed for {} input bytes", data.len());
}

#[test]
fn empty_and_tiny_inputs() {
    for data in [&b""[..], b"a", b"ab", b"abc", b"abcd", b"aaaa"] {
        round_trip(data);
    }
}

#[test]
fn block_boundary_sizes() {
    let mut rng = StdRng::seed_from_u64(7);
    for size in [
        MAX_ENCODED_BLOCK_SIZE - 7,
        MAX_ENCODED_BLOCK_SIZE - 1,
        MAX_ENCODED_BLOCK_SIZE,
        MAX_ENCODED_BLOCK_SIZE + 1,
        MAX_ENCODED_BLOCK_SIZE + 9,
        3 * MAX_ENCODED_BLOCK_SIZE + 17,
    ] {
        let data: Vec<u8> = (0..size).map(|_| rng.random_range(0..128u8)).collect();
        round_trip(&data);
    }
}

#[test]
fn random_small_alphabets() {
    let mut rng = StdRng::seed_from_u64(11);
    for alphabet in [2u8, 4, 16, 128] {
        for size in [10usize, 100, 1000, 5000, 20000] {
            let data: Vec<u8> = (0..size).map(|_| rng.random_range(0..alphabet)).collect();
            round_trip(&data);
        }
    }
}

#[test]
fn run_heavy_inputs() {
    let mut rng = StdRng::seed_from_u64(23);
    let mut data = Vec::new();
    while data.len() < 30000 {
        let byte = rng.random_range(0..8u8);
        let len = rng.random_range(1..40usize);
        data.extend(std::iter::repeat_n(byte, len));
    }
    round_trip(&data);
    round_trip(&vec![0u8; 10000]);
    round_trip(&b"ab".repeat(9000));
}

#[test]
fn stepping_inputs_both_directions() {
    round_trip(&[0x01, 0x23, 0x45, 0x67]);
    round_trip(&(0u8..100).collect::<Vec<u8>>());
    round_trip(&(0u8..100).rev().collect::<Vec<u8>>());
    let mut data = Vec::new();
    let mut v = 60i32;
    let mut rng = StdRng::seed_from_u64(31);
    while data.len() < 12000 {
        let step = [-3i32, -2, -1, 1, 2, 3][rng.random_range(0..6)];
        for _ in 0..rng.random_range(2..12) {
            data.push((v.rem_euclid(128)) as u8);
            v += step;
        }
        v = rng.random_range(0..64);
    }
    round_trip(&data);
}

#[test]
fn repetitive_text() {
    let words: &[&[u8]] = &[b"foo ", b"bar ", b"hello world ", b"abcabc ", b"the quick "];
    let mut rng = StdRng::seed_from_u64(43);
    for target in [300usize, 3000, 15000] {
        let mut data = Vec::new();
        while data.len() < target {
            data.extend_from_slice(words[rng.random_range(0..words.len())]);
        }
        round_trip(&data);
    }
}

#[test]
fn compressible_beats_random() {
    let mut rng = StdRng::seed_from_u64(5);
    let random: Vec<u8> = (0..10000).map(|_| rng.random_range(0..128u8)).collect();
    let repetitive = b"ab".repeat(5000);
    let enc_random = encode_bytes(&random).unwrap();
    let enc_repetitive = encode_bytes(&repetitive).unwrap();
    assert!(enc_repetitive.len() < enc_random.len());
    assert!(enc_repetitive.len() < 100);
}

#[test]
fn size_never_explodes() {
    let mut rng = StdRng::seed_from_u64(13);
    for size in [100usize, 4000, 12000] {
        let data: Vec<u8> = (0..size).map(|_| rng.random_range(0..128u8)).collect();
        let enc = encode_bytes(&data).unwrap();
        assert!(enc.len() <= data.len() * 2 + 16);
    }
}

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|k| u8::from_str_radix(&s[k..k + 2], 16).unwrap())
        .collect()
}

/// Known-good encodings covering the marker repertoire: literal runs,
/// back-refs, repeat chains, stepping runs in both widths, specials and
/// synthesized meta-pattern refs.
#[test]
fn golden_encodings() {
    let cases: &[(&[u8], &str)] = &[
        (&[0x01, 0x02, 0x03], "010203"),
        (&[0x41; 16], "41f18000f00241"),
        (b"ABCDEABCDE", "4142f913a000"),
        (&[0x01, 0x23, 0x45, 0x67, 0x89], "0123f903"),
        (&[9, 8, 7, 6, 5, 4], "0908f914"),
        (&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01], "000100f3010001"),
    ];
    for (input, expected) in cases {
        let enc = encode_bytes(input).unwrap();
        assert_eq!(enc, hex(expected), "encoding of {input:02x?}");
        assert_eq!(decode_bytes(&enc).unwrap(), *input);
    }

    let trigram = b"ABC".repeat(100);
    assert_eq!(encode_bytes(&trigram).unwrap(), hex("4142438000f061"));

    let zeros = vec![0u8; 10000];
    assert_eq!(encode_bytes(&zeros).unwrap(), hex("00f18000f7ff8000f50100"));

    let words = b"foo bar foo bar hello foo bar ".repeat(20);
    assert_eq!(
        encode_bytes(&words).unwrap(),
        hex("666ff02062617220ff68656cf06f20fff001b00a90109014f00fb00affd000")
    );
    assert_eq!(decode_bytes(&encode_bytes(&words).unwrap()).unwrap(), words);
}

#[test]
fn truncated_streams_fail_cleanly() {
    // a lone special marker has no table to draw from
    assert!(decode_bytes(&[0xFF]).is_err());
    // a stepping marker with no count byte
    assert!(decode_bytes(&[0x01, 0x23, 0xF9]).is_err());
    // random garbage must never panic
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..500 {
        let len = rng.random_range(0..300usize);
        let garbage: Vec<u8> = (0..len).map(|_| rng.random()).collect();
        let _ = decode_bytes(&garbage);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trips_any_7bit_payload(data in proptest::collection::vec(0u8..128, 0..12000)) {
        let enc = encode_bytes(&data).unwrap();
        let dec = decode_bytes(&enc).unwrap();
        prop_assert_eq!(dec, data);
    }

    #[test]
    fn round_trips_low_entropy_payload(data in proptest::collection::vec(0u8..3, 0..12000)) {
        let enc = encode_bytes(&data).unwrap();
        let dec = decode_bytes(&enc).unwrap();
        prop_assert_eq!(dec, data);
    }
}
