//! Property-based testing for equal-block counting
//!
//! Uses proptest to check that every code path agrees with a naive reference
//! and that counts compose across concatenation.

use bytelane::{count_pairs, ElementWidth, PairCounter, X86Features};
use proptest::prelude::*;

// =============================================================================
// PROPERTY TEST GENERATORS
// =============================================================================

fn width_strategy() -> impl Strategy<Value = ElementWidth> {
    prop::sample::select(ElementWidth::ALL.to_vec())
}

/// Buffers built from a small alphabet of blocks so adjacent matches are common
fn blocky_buffer(width: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..3, 0..200).prop_map(move |symbols| {
        let mut data = Vec::with_capacity(symbols.len() * width);
        for symbol in symbols {
            data.extend((0..width).map(|i| symbol.wrapping_add((i % 3) as u8)));
        }
        data
    })
}

fn width_and_buffer() -> impl Strategy<Value = (ElementWidth, Vec<u8>, usize)> {
    width_strategy().prop_flat_map(|width| {
        (
            Just(width),
            blocky_buffer(width.size()),
            0..width.size(),
        )
    })
}

fn reference(data: &[u8], width: usize) -> usize {
    let blocks: Vec<&[u8]> = data.chunks_exact(width).collect();
    blocks.windows(2).filter(|pair| pair[0] == pair[1]).count()
}

// =============================================================================
// EQUIVALENCE
// =============================================================================

proptest! {
    #[test]
    fn prop_paths_agree_with_reference((width, data, extra) in width_and_buffer()) {
        // A few stray trailing bytes must never change the count
        let mut data = data;
        data.extend(std::iter::repeat(0xEE).take(extra));

        let expected = reference(&data, width.size());
        let scalar = PairCounter::with_features(X86Features::empty());
        prop_assert_eq!(scalar.count_width(&data, width), expected);
        prop_assert_eq!(PairCounter::new().count_width(&data, width), expected);
        prop_assert_eq!(count_pairs(&data, width), expected);
    }

    #[test]
    fn prop_random_bytes_agree(
        width in width_strategy(),
        data in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let scalar = PairCounter::with_features(X86Features::empty());
        prop_assert_eq!(
            PairCounter::new().count_width(&data, width),
            scalar.count_width(&data, width)
        );
    }

    #[test]
    fn prop_count_bounded_by_block_count((width, data, _) in width_and_buffer()) {
        let blocks = data.len() / width.size();
        let count = count_pairs(&data, width);
        prop_assert!(count <= blocks.saturating_sub(1));
    }

    // =========================================================================
    // COMPOSITION
    // =========================================================================

    #[test]
    fn prop_concatenation_composes(
        (width, a, _) in width_and_buffer(),
        b_symbols in prop::collection::vec(0u8..3, 0..200),
    ) {
        let w = width.size();
        let b: Vec<u8> = b_symbols
            .iter()
            .flat_map(|&s| (0..w).map(move |i| s.wrapping_add((i % 3) as u8)))
            .collect();

        let mut joined = a.clone();
        joined.extend_from_slice(&b);

        let seam = match (a.len() >= w, b.len() >= w) {
            (true, true) => usize::from(a[a.len() - w..] == b[..w]),
            _ => 0,
        };

        prop_assert_eq!(
            count_pairs(&joined, width),
            count_pairs(&a, width) + count_pairs(&b, width) + seam
        );
    }
}
