//! A synthetic acoustic-model test double for the scenario tests in
//! `tests/scenarios.rs` (spec §8's S1-S6), standing in for the
//! out-of-scope acoustic front-end/senone scorer (spec §1, §6).

use std::collections::HashMap;

use fsg_decoder::hmm::N_EMIT_STATE;
use fsg_decoder::AcousticModel;

/// Feeds a fixed per-phone senone score for every frame, with an optional
/// per-phone override so a test can make one phone systematically score
/// better or worse than the default.
pub struct ScriptedAcousticModel {
    default_senscr: [i32; N_EMIT_STATE],
    overrides: HashMap<u16, [i32; N_EMIT_STATE]>,
    active: std::collections::HashSet<u16>,
    n_frames: i32,
}

impl ScriptedAcousticModel {
    pub fn new(default_senscr: [i32; N_EMIT_STATE], n_frames: i32) -> Self {
        Self {
            default_senscr,
            overrides: HashMap::new(),
            active: std::collections::HashSet::new(),
            n_frames,
        }
    }

    /// Make `phone` score `senscr` every frame instead of the default.
    pub fn set_phone_score(&mut self, phone: u16, senscr: [i32; N_EMIT_STATE]) {
        self.overrides.insert(phone, senscr);
    }
}

impl AcousticModel for ScriptedAcousticModel {
    fn score(&mut self, _frame: i32, phone: u16) -> [i32; N_EMIT_STATE] {
        debug_assert!(self.active.contains(&phone), "scored an inactive phone");
        self.overrides
            .get(&phone)
            .copied()
            .unwrap_or(self.default_senscr)
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
