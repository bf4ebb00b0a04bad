//! Property-based tests for the universal invariants in spec §8 that
//! hold over arbitrary input rather than one scripted scenario:
//! history back-pointer acyclicity (#2), beam floor/geometric decay (#7),
//! and cross-word context admissibility (#10).

use proptest::prelude::*;

use fsg_decoder::beam::{BeamController, Beams, FLOOR, NARROW_FACTOR};
use fsg_decoder::ctxt::CtxtSet;
use fsg_decoder::history::{HistEntry, HistoryTable};
use fsg_decoder::lextree::cross_word_admissible;

fn beams_strategy() -> impl Strategy<Value = Beams> {
    (-50_000i32..-100, -40_000i32..-100, -30_000i32..-100).prop_map(|(beam, pbeam, wbeam)| Beams {
        beam,
        pbeam,
        wbeam,
    })
}

proptest! {
    /// Narrowing the beam controller any number of times never drops
    /// `beam_factor` below `FLOOR`, and it always decays geometrically by
    /// `NARROW_FACTOR` until it saturates there (spec §8#7).
    #[test]
    fn beam_factor_never_drops_below_floor(full in beams_strategy(), narrows in 0usize..60) {
        let mut c = BeamController::new(full);
        let mut expected = 1.0f64;
        for _ in 0..narrows {
            c.narrow();
            expected = (expected * NARROW_FACTOR).max(FLOOR);
            prop_assert!(c.beam_factor() >= FLOOR - 1e-9);
            prop_assert!((c.beam_factor() - expected).abs() < 1e-9);
        }
    }

    /// A single under-cap frame fully resets the beam to full width,
    /// regardless of how narrow it had become (spec §4.1).
    #[test]
    fn beam_reset_always_restores_full_width(full in beams_strategy(), narrows in 0usize..60) {
        let mut c = BeamController::new(full);
        for _ in 0..narrows {
            c.narrow();
        }
        c.reset();
        prop_assert_eq!(c.beam_factor(), 1.0);
    }

    /// Any chain of history entries built by always pointing `pred` at an
    /// earlier, strictly-lower-frame index is acyclic (spec §8#2): the
    /// walk terminates at the dummy start entry in at most as many steps
    /// as there are entries.
    #[test]
    fn history_chains_built_with_strictly_decreasing_frames_are_acyclic(
        chain_len in 1usize..40
    ) {
        let mut h = HistoryTable::new();
        h.reset(8, 0);
        let mut prev = 0i32;
        let mut cur_frame = 0i32;
        for _ in 0..chain_len {
            let idx = h.push(HistEntry {
                word_id: Some(0),
                frame: cur_frame,
                score: -cur_frame,
                pred: prev,
                state: 0,
                exit_phone: 0,
                lc: CtxtSet::all(8),
                rc: CtxtSet::all(8),
            });
            prev = idx as i32;
            cur_frame += 1;
        }
        prop_assert!(h.trace_is_acyclic(prev as usize));
    }

    /// Cross-word admissibility is exactly the conjunction of the two
    /// bitset membership tests, for arbitrary phone universes and phones
    /// (spec §8#10, §4.5).
    #[test]
    fn cross_word_admissibility_matches_both_bitset_tests(
        n_ciphones in 4usize..16,
        exit_phone in 0u16..4,
        root_phone in 0u16..4,
        rc_contains_root in any::<bool>(),
        lc_contains_exit in any::<bool>(),
    ) {
        let exit_rc = if rc_contains_root { CtxtSet::all(n_ciphones) } else { CtxtSet::none(n_ciphones) };
        let root_lc = if lc_contains_exit { CtxtSet::all(n_ciphones) } else { CtxtSet::none(n_ciphones) };

        let admissible = cross_word_admissible(&exit_rc, root_phone, &root_lc, exit_phone);
        prop_assert_eq!(admissible, rc_contains_root && lc_contains_exit);
    }
}
