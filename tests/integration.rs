use blockdelta::{
    apply_patch, create_patch, decode_patch, encode_patch, inspect, ErrorKind, Instruction,
    PATCH_HEADER_SIZE,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── helpers ──────────────────────────────────────────────────────────────

const BLOCK_SIZES: [u32; 5] = [1, 2, 4, 16, 64];

fn roundtrip(old: &[u8], new: &[u8], block_size: u32) -> Vec<u8> {
    let patch = create_patch(old, new, block_size).unwrap();
    apply_patch(old, &patch).unwrap()
}

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

/// Copy of `base` with `edits` single-byte substitutions at random positions.
fn scatter_edits(base: &[u8], edits: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut v = base.to_vec();
    for _ in 0..edits {
        let idx = rng.gen_range(0..v.len());
        v[idx] = rng.gen();
    }
    v
}

// ── basic scenarios ──────────────────────────────────────────────────────

// TestInsertBetweenBlocks
#[test]
fn test_insert_between_blocks() {
    let old = b"AAAABBBBCCCC";
    let new = b"AAAABBBBDDDDCCCC";
    let patch = create_patch(old, new, 4).unwrap();
    let decoded = inspect(&patch).unwrap();
    assert_eq!(
        decoded.instructions,
        vec![
            Instruction::Copy { old_offset: 0, length: 8 },
            Instruction::Insert { bytes: b"DDDD".to_vec() },
            Instruction::Copy { old_offset: 8, length: 4 },
        ]
    );
    assert_eq!(apply_patch(old, &patch).unwrap(), new);
}

// TestIdentical
#[test]
fn test_identical() {
    let data: Vec<u8> = b"The quick brown fox jumps over the lazy dog."
        .iter()
        .cycle()
        .take(44 * 10 + 3)
        .copied()
        .collect();
    for bs in BLOCK_SIZES {
        let patch = create_patch(&data, &data, bs).unwrap();
        let decoded = inspect(&patch).unwrap();
        assert_eq!(
            decoded.instructions,
            vec![Instruction::Copy { old_offset: 0, length: data.len() as u64 }],
            "block size {}",
            bs
        );
        assert_eq!(apply_patch(&data, &patch).unwrap(), data);
    }
}

// TestIdenticalShorterThanBlock
#[test]
fn test_identical_shorter_than_block() {
    let data = b"short";
    let decoded = inspect(&create_patch(data, data, 16).unwrap()).unwrap();
    assert_eq!(
        decoded.instructions,
        vec![Instruction::Insert { bytes: data.to_vec() }]
    );
}

// TestEmptyNew
#[test]
fn test_empty_new() {
    let patch = create_patch(b"hello world", b"", 4).unwrap();
    let decoded = inspect(&patch).unwrap();
    assert!(decoded.instructions.is_empty());
    assert_eq!(decoded.header.new_len, 0);
    assert!(apply_patch(b"hello world", &patch).unwrap().is_empty());
}

// TestEmptyOld
#[test]
fn test_empty_old() {
    let new = b"hello world";
    let patch = create_patch(b"", new, 4).unwrap();
    let decoded = inspect(&patch).unwrap();
    assert_eq!(
        decoded.instructions,
        vec![Instruction::Insert { bytes: new.to_vec() }]
    );
    assert_eq!(apply_patch(b"", &patch).unwrap(), new);
}

// TestBothEmpty
#[test]
fn test_both_empty() {
    let patch = create_patch(b"", b"", 16).unwrap();
    assert!(apply_patch(b"", &patch).unwrap().is_empty());
}

// TestCompletelyDifferent
#[test]
fn test_completely_different() {
    let old: Vec<u8> = (0..=255u8).cycle().take(512).collect();
    let new: Vec<u8> = (0..=255u8).rev().cycle().take(512).collect();
    for bs in BLOCK_SIZES {
        assert_eq!(roundtrip(&old, &new, bs), new, "block size {}", bs);
    }
}

// ── randomized round trips ───────────────────────────────────────────────

// TestRandomRoundTrip
#[test]
fn test_random_roundtrip() {
    for seed in 0..8u64 {
        let old = random_bytes(seed, 1500);
        let new = random_bytes(seed + 100, 1200);
        for bs in BLOCK_SIZES {
            assert_eq!(roundtrip(&old, &new, bs), new, "seed {} bs {}", seed, bs);
        }
    }
}

// TestScatteredModifications
#[test]
fn test_scattered_modifications() {
    let old = random_bytes(42, 4000);
    let new = scatter_edits(&old, 100, 43);
    for bs in BLOCK_SIZES {
        assert_eq!(roundtrip(&old, &new, bs), new, "block size {}", bs);
    }
}

// TestShuffledSegments
#[test]
fn test_shuffled_segments() {
    let old = random_bytes(7, 4096);
    let mut new = Vec::new();
    new.extend_from_slice(&old[3000..3500]);
    new.extend_from_slice(b"inserted text between moved regions");
    new.extend_from_slice(&old[10..900]);
    new.extend_from_slice(&old[10..900]);
    new.extend_from_slice(&old[4000..]);
    for bs in BLOCK_SIZES {
        assert_eq!(roundtrip(&old, &new, bs), new, "block size {}", bs);
    }
}

// TestDeterministic
#[test]
fn test_deterministic() {
    let old = random_bytes(1, 3000);
    let new = scatter_edits(&old, 50, 2);
    for bs in BLOCK_SIZES {
        let a = create_patch(&old, &new, bs).unwrap();
        let b = create_patch(&old, &new, bs).unwrap();
        assert_eq!(a, b, "block size {}", bs);
    }
}

// TestPatchSmallerThanLiteral
#[test]
fn test_patch_smaller_than_literal() {
    let old = random_bytes(11, 8192);
    let new = scatter_edits(&old, 20, 12);
    let literal = create_patch(b"", &new, 16).unwrap();
    for bs in [1u32, 2, 4, 8, 16, 32] {
        let patch = create_patch(&old, &new, bs).unwrap();
        assert!(
            patch.len() <= literal.len(),
            "block size {}: patch {} bytes, literal {} bytes",
            bs,
            patch.len(),
            literal.len()
        );
        if bs >= 4 {
            assert!(patch.len() < literal.len() / 4, "block size {}", bs);
        }
        assert_eq!(apply_patch(&old, &patch).unwrap(), new);
    }
}

// TestSingleByteBlocksStayLiteral
#[test]
fn test_single_byte_blocks_stay_literal() {
    // every byte value occurs early in old, so one-byte matches are everywhere
    let old = random_bytes(13, 8192);
    let new = random_bytes(14, 4096);
    let literal = create_patch(b"", &new, 1).unwrap();
    let patch = create_patch(&old, &new, 1).unwrap();
    assert!(patch.len() <= literal.len());
    for ins in &inspect(&patch).unwrap().instructions {
        if let Instruction::Copy { length, .. } = ins {
            assert!(*length >= 4, "unprofitable {}", ins);
        }
    }
}

// TestReencodeIsStable
#[test]
fn test_reencode_is_stable() {
    let old = random_bytes(21, 2048);
    let new = scatter_edits(&old, 10, 22);
    let bytes = create_patch(&old, &new, 8).unwrap();
    assert_eq!(encode_patch(&decode_patch(&bytes).unwrap()), bytes);
}

// ── corruption and misuse ────────────────────────────────────────────────

// TestTamperDetected
#[test]
fn test_tamper_detected() {
    // any flipped byte past the header must be rejected
    let old = random_bytes(31, 2048);
    let mut new = scatter_edits(&old, 8, 32);
    new.extend_from_slice(&random_bytes(33, 40));
    let patch = create_patch(&old, &new, 16).unwrap();
    assert!(patch.len() > PATCH_HEADER_SIZE);

    for i in PATCH_HEADER_SIZE..patch.len() {
        let mut bad = patch.clone();
        bad[i] ^= 0xff;
        let err = apply_patch(&old, &bad).unwrap_err();
        assert!(
            matches!(
                err.kind(),
                ErrorKind::Format | ErrorKind::Range | ErrorKind::Checksum
            ),
            "byte {}: unexpected {:?}",
            i,
            err
        );
    }
}

// TestDigestTamperDetected
#[test]
fn test_digest_tamper_detected() {
    let old = random_bytes(41, 512);
    let new = scatter_edits(&old, 4, 42);
    let mut patch = create_patch(&old, &new, 8).unwrap();
    patch[PATCH_HEADER_SIZE - 1] ^= 0x01;
    assert_eq!(apply_patch(&old, &patch).unwrap_err().kind(), ErrorKind::Checksum);
}

// TestWrongOldRejected
#[test]
fn test_wrong_old_rejected() {
    let old = random_bytes(51, 1024);
    let new = scatter_edits(&old, 4, 52);
    let patch = create_patch(&old, &new, 16).unwrap();

    let shorter = &old[..1000];
    assert_eq!(apply_patch(shorter, &patch).unwrap_err().kind(), ErrorKind::Range);

    // same length, different content: only the digest can tell
    let other = random_bytes(53, 1024);
    assert_eq!(apply_patch(&other, &patch).unwrap_err().kind(), ErrorKind::Checksum);
}

// TestTruncatedPatch
#[test]
fn test_truncated_patch() {
    let old = random_bytes(61, 256);
    let new = scatter_edits(&old, 3, 62);
    let patch = create_patch(&old, &new, 8).unwrap();
    for cut in 0..patch.len() {
        assert_eq!(
            apply_patch(&old, &patch[..cut]).unwrap_err().kind(),
            ErrorKind::Format,
            "cut at {}",
            cut
        );
    }
}

// TestZeroBlockSize
#[test]
fn test_zero_block_size() {
    let err = create_patch(b"abc", b"abc", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

// ── properties ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_roundtrip(
        old in proptest::collection::vec(any::<u8>(), 0..600),
        new in proptest::collection::vec(any::<u8>(), 0..600),
        bs in 1u32..40,
    ) {
        let patch = create_patch(&old, &new, bs).unwrap();
        prop_assert_eq!(apply_patch(&old, &patch).unwrap(), new);
    }

    #[test]
    fn prop_roundtrip_related(
        old in proptest::collection::vec(0u8..4, 1..800),
        cut in 0usize..800,
        extra in proptest::collection::vec(any::<u8>(), 0..50),
        bs in 1u32..20,
    ) {
        // small alphabet keeps fingerprint collisions and repeats frequent
        let cut = cut % old.len();
        let mut new = old[cut..].to_vec();
        new.extend_from_slice(&extra);
        new.extend_from_slice(&old[..cut]);
        let patch = create_patch(&old, &new, bs).unwrap();
        prop_assert_eq!(apply_patch(&old, &patch).unwrap(), new);
    }

    #[test]
    fn prop_never_larger_than_literal(
        old in proptest::collection::vec(0u8..8, 0..600),
        new in proptest::collection::vec(0u8..8, 0..600),
        bs in 1u32..8,
    ) {
        let patch = create_patch(&old, &new, bs).unwrap();
        let literal = create_patch(b"", &new, bs).unwrap();
        prop_assert!(patch.len() <= literal.len(), "{} > {}", patch.len(), literal.len());
    }

    #[test]
    fn prop_deterministic(
        old in proptest::collection::vec(any::<u8>(), 0..300),
        new in proptest::collection::vec(any::<u8>(), 0..300),
        bs in 1u32..32,
    ) {
        prop_assert_eq!(
            create_patch(&old, &new, bs).unwrap(),
            create_patch(&old, &new, bs).unwrap()
        );
    }
}
