//! The acoustic-scoring collaborator (spec §6, "Acoustic scoring
//! interface"). The decoder core never computes senone scores itself: it
//! asks this trait for them once per active HMM per frame, matching how
//! `fsg_search_hmm_eval` calls out to `acmod_t` in the original.

use crate::hmm::N_EMIT_STATE;

/// Supplies per-frame acoustic evidence to the search.
///
/// Non-goal (spec §1): this crate does not implement feature extraction,
/// GMM/DNN scoring, or any particular acoustic front end. Embedding
/// applications provide one.
pub trait AcousticModel {
    /// Compute senone scores for every phone HMM whose `ci_ext`
    /// (base context-independent phone, spec §3) was marked active via
    /// [`AcousticModel::activate_hmm`] for the current frame, matching
    /// `acmod_score`/`fsg_search_hmm_eval`'s `acmod_activate_hmm` /
    /// `acmod_score` pair.
    ///
    /// Returns `[i32; N_EMIT_STATE]` per phone, keyed by the same id
    /// passed to `activate_hmm`.
    fn score(&mut self, frame: i32, phone: u16) -> [i32; N_EMIT_STATE];

    /// Mark a context-independent phone's senones as needed for the
    /// upcoming `score` call this frame (`acmod_activate_hmm`).
    fn activate_hmm(&mut self, phone: u16);

    /// Clear the active-senone set before the next frame's activations
    /// (`acmod_clear_active`).
    fn clear_active(&mut self);

    /// Number of feature frames of audio currently buffered and ready to
    /// be consumed by [`AcousticModel::score`] (`acmod_n_feat_frame`).
    fn n_feat_frame(&self) -> i32;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashSet;

    /// A deterministic stand-in acoustic model for unit/scenario tests:
    /// every phone scores a fixed `[i32; N_EMIT_STATE]` regardless of
    /// frame, so test assertions can reason about search-loop behavior
    /// without modeling real acoustics.
    pub struct ConstantAcousticModel {
        pub senscr: [i32; N_EMIT_STATE],
        active: HashSet<u16>,
        n_frames: i32,
    }

    impl ConstantAcousticModel {
        pub fn new(senscr: [i32; N_EMIT_STATE], n_frames: i32) -> Self {
            Self {
                senscr,
                active: HashSet::new(),
                n_frames,
            }
        }
    }

    impl AcousticModel for ConstantAcousticModel {
        fn score(&mut self, _frame: i32, phone: u16) -> [i32; N_EMIT_STATE] {
            debug_assert!(self.active.contains(&phone));
            self.senscr
        }

        fn activate_hmm(&mut self, phone: u16) {
            self.active.insert(phone);
        }

        fn clear_active(&mut self) {
            self.active.clear();
        }

        fn n_feat_frame(&self) -> i32 {
            self.n_frames
        }
    }
}
