//! Frame-synchronous Viterbi search orchestration (spec §4.6 "decoding
//! loop"; §4.8 "FSG set management"; §4.9 "finish/find_exit";
//! §4.10 "hypothesis extraction").
//!
//! `FsgDecoder::step` follows `fsg_search_step`'s ordering exactly: HMM
//! evaluation, prune/propagate, null propagation, then cross-word
//! transition, each confined to the frame just completed before any
//! entries for the next frame are created.

use std::collections::{HashMap, HashSet};

use crate::acoustic::AcousticModel;
use crate::beam::BeamController;
use crate::config::DecoderConfig;
use crate::ctxt::CtxtSet;
use crate::dict::Dictionary;
use crate::error::{DecoderError, Result};
use crate::fsg::FsgModel;
use crate::history::{HistEntry, HistoryTable};
use crate::hmm::HmmTopology;
use crate::lattice::Lattice;
use crate::lextree::{build_lextree, cross_word_admissible, Lextree, PNodeKind};
use crate::logmath::{LogMath, WORST_SCORE};
use crate::seg_iter::SegIter;

/// A named registry of FSG models with one of them current, matching
/// `fsg_set_t` (`fsg_set_add`/`remove`/`select`/`get_fsg`/`iter`).
#[derive(Debug, Default)]
pub struct FsgSet {
    models: HashMap<String, FsgModel>,
    current: Option<String>,
}

impl FsgSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fsg` under `name`, auto-augmenting it first
    /// (`fsg_search_add_silences`/`fsg_search_add_altpron`): when
    /// `fsgusefiller` is set and the grammar has no silence arcs yet, add
    /// a `<sil>` self-loop at every state plus one for every other filler
    /// word the dictionary knows about; when `fsgusealtpron` is set and
    /// the grammar has no alternates yet, give every vocabulary word with
    /// dictionary alternates an `add_alt` arc. Both are idempotent per
    /// FSG (`has_sil`/`has_alt` guard against double-augmentation across
    /// repeated registrations of the same model).
    pub fn add(
        &mut self,
        name: impl Into<String>,
        mut fsg: FsgModel,
        config: &DecoderConfig,
        logmath: &LogMath,
        dict: &dyn Dictionary,
    ) {
        let name = name.into();
        if config.fsgusefiller && !fsg.has_sil() {
            fsg.add_silence("<sil>", None, config.silprob, logmath);
            for wid in 0..dict.n_words() as i32 {
                if !dict.is_filler_word(wid) {
                    continue;
                }
                let word = dict.word_str(wid);
                if word == "<sil>" {
                    continue;
                }
                if fsg.word_id(word).map_or(false, |w| fsg.is_filler(w)) {
                    continue;
                }
                fsg.add_silence(word, None, config.fillprob, logmath);
            }
        }
        if config.fsgusealtpron && !fsg.has_alt() {
            for base_wid in 0..fsg.n_word() as i32 {
                let base_str = fsg.word_str(base_wid).to_string();
                let Some(dict_wid) = dict.to_id(&base_str) else {
                    continue;
                };
                let mut alt = dict.next_alt(dict_wid);
                while let Some(alt_wid) = alt {
                    let alt_str = dict.word_str(alt_wid);
                    if alt_str != base_str {
                        fsg.add_alt(&base_str, alt_str);
                    }
                    alt = dict.next_alt(alt_wid);
                }
            }
        }
        tracing::info!(fsg = %name, n_state = fsg.n_state(), n_word = fsg.n_word(), "fsg registered");
        self.models.insert(name, fsg);
    }

    pub fn remove(&mut self, name: &str) -> Result<FsgModel> {
        let fsg = self.models.remove(name).ok_or_else(|| {
            tracing::error!(fsg = name, "fsg to be removed not found");
            DecoderError::FsgNotFound(name.to_string())
        })?;
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        tracing::info!(fsg = name, "fsg removed");
        Ok(fsg)
    }

    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.models.contains_key(name) {
            tracing::error!(fsg = name, "unknown fsg, cannot select");
            return Err(DecoderError::UnknownFsg(name.to_string()));
        }
        self.current = Some(name.to_string());
        tracing::info!(fsg = name, "fsg selected");
        Ok(())
    }

    pub fn current(&self) -> Option<&FsgModel> {
        self.current.as_ref().and_then(|n| self.models.get(n))
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&FsgModel> {
        self.models.get(name)
    }

    pub fn iter_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|s| s.as_str())
    }
}

/// Owns the search state for one FSG grammar across an utterance: the
/// lextree, the history table, the active-pnode set, and the adaptive
/// beam controller.
pub struct FsgDecoder<A: AcousticModel, D: Dictionary> {
    config: DecoderConfig,
    logmath: LogMath,
    dict: D,
    acoustic: A,
    fsg_set: FsgSet,
    lextree: Option<Lextree>,
    topology: HmmTopology,
    history: HistoryTable,
    beams: BeamController,
    active: Vec<usize>,
    frame: i32,
    n_hmm_eval: u64,
    n_sen_eval: u64,
    final_hist: Option<usize>,
    final_: bool,
    /// Cached lattice for the frame it was last built at (spec §4.9
    /// "Caching": a second `lattice()` call with no intervening `step`
    /// returns the same object rather than rebuilding).
    lattice_cache: Option<(i32, Lattice)>,
}

impl<A: AcousticModel, D: Dictionary> FsgDecoder<A, D> {
    pub fn new(config: DecoderConfig, logmath: LogMath, dict: D, acoustic: A, topology: HmmTopology) -> Self {
        let beams = BeamController::new({
            let b = config.beams_in_logspace(&logmath);
            crate::beam::Beams {
                beam: b.beam,
                pbeam: b.pbeam,
                wbeam: b.wbeam,
            }
        });
        Self {
            config,
            logmath,
            dict,
            acoustic,
            fsg_set: FsgSet::new(),
            lextree: None,
            topology,
            history: HistoryTable::new(),
            beams,
            active: Vec::new(),
            frame: 0,
            n_hmm_eval: 0,
            n_sen_eval: 0,
            final_hist: None,
            final_: false,
            lattice_cache: None,
        }
    }

    pub fn fsg_set(&self) -> &FsgSet {
        &self.fsg_set
    }

    pub fn fsg_set_add(&mut self, name: impl Into<String>, fsg: FsgModel) {
        self.fsg_set.add(name, fsg, &self.config, &self.logmath, &self.dict);
    }

    pub fn fsg_set_remove(&mut self, name: &str) -> Result<()> {
        self.fsg_set.remove(name)?;
        Ok(())
    }

    pub fn fsg_set_select(&mut self, name: &str) -> Result<()> {
        self.fsg_set.select(name)?;
        self.reinit()
    }

    /// Rebuild the lextree from the currently selected FSG, matching
    /// `fsg_search_reinit`. Must be called again any time the selected
    /// FSG's arcs change after selection.
    pub fn reinit(&mut self) -> Result<()> {
        let fsg = self.fsg_set.current().ok_or(DecoderError::NoCurrentFsg)?;
        self.lextree = Some(build_lextree(fsg, &self.dict, self.topology, self.config.fsgusealtpron));
        tracing::info!(
            n_pnode = self.lextree.as_ref().unwrap().n_pnode(),
            "lextree rebuilt"
        );
        Ok(())
    }

    pub fn n_hmm_eval(&self) -> u64 {
        self.n_hmm_eval
    }

    pub fn n_sen_eval(&self) -> u64 {
        self.n_sen_eval
    }

    pub fn n_frame(&self) -> i32 {
        self.frame
    }

    /// Begin a new utterance: seed frame 0's active set by running
    /// null-propagation and cross-word transition from the dummy start
    /// entry, exactly as any other frame's committed exits (spec §4.7),
    /// matching `fsg_search_start`.
    pub fn start(&mut self) -> Result<()> {
        if self.lextree.is_none() {
            return Err(DecoderError::NoCurrentFsg);
        }
        let fsg = self.fsg_set.current().ok_or(DecoderError::NoCurrentFsg)?;
        let start_state = fsg.start_state();
        let start_idx = self.history.reset(self.dict.n_ciphones(), start_state);
        self.beams.reset();
        self.frame = 0;
        self.n_hmm_eval = 0;
        self.n_sen_eval = 0;
        self.final_hist = None;
        self.final_ = false;
        self.lattice_cache = None;

        let best_score = self.history.get(start_idx).score;
        let null_exits = self.null_propagate(&[start_idx], best_score);
        let mut exits = vec![start_idx];
        exits.extend(null_exits);
        let activated = self.cross_word_transition(&exits, 0);

        self.active = activated.into_iter().collect();
        tracing::info!(n_active = self.active.len(), "utterance started");
        Ok(())
    }

    /// Process one frame: HMM evaluation, beam prune/propagate, then
    /// cross-word transition into the next frame's active set. Returns
    /// `false` (without advancing) if the acoustic model has no new
    /// frame buffered yet.
    pub fn step(&mut self) -> Result<bool> {
        if self.acoustic.n_feat_frame() <= self.frame {
            return Ok(false);
        }
        if self.active.is_empty() {
            tracing::error!(frame = self.frame, "no active HMM at frame start");
        }

        self.acoustic.clear_active();
        let lextree = self.lextree.as_mut().ok_or(DecoderError::NoCurrentFsg)?;
        for &idx in &self.active {
            self.acoustic.activate_hmm(lextree.node(idx).ci_ext);
        }

        let n_active = self.active.len();
        assert!(
            n_active <= lextree.n_pnode(),
            "active HMM count {n_active} exceeds total lextree pnode count {}",
            lextree.n_pnode()
        );

        for &idx in &self.active {
            let node = lextree.node_mut(idx);
            let senscr = self.acoustic.score(self.frame, node.ci_ext);
            node.hmm.vit_eval(&senscr);
        }
        self.n_hmm_eval += n_active as u64;
        self.n_sen_eval += n_active as u64;

        if self.config.maxhmmpf >= 0 && n_active as i32 > self.config.maxhmmpf {
            self.beams.narrow();
            tracing::warn!(
                frame = self.frame,
                n_active,
                maxhmmpf = self.config.maxhmmpf,
                beam_factor = self.beams.beam_factor(),
                "active HMM count exceeds cap, narrowing beam"
            );
        } else {
            self.beams.reset();
        }
        let beams = self.beams.effective();

        let best_score = self
            .active
            .iter()
            .map(|&idx| lextree.node(idx).hmm.best_score())
            .max()
            .unwrap_or(WORST_SCORE);

        self.history.begin_frame();

        let mut survivors = Vec::with_capacity(self.active.len());
        let mut word_exits: Vec<usize> = Vec::new();
        // (child pnode index, entry score, predecessor history index)
        let mut internal_trans: Vec<(usize, i32, i32)> = Vec::new();

        for &idx in &self.active {
            let node = lextree.node(idx);
            let score = node.hmm.best_score();
            if score < best_score + beams.beam {
                continue;
            }
            survivors.push(idx);

            let out = node.hmm.out_score();
            if out <= WORST_SCORE || out < best_score + beams.pbeam {
                continue;
            }

            match &node.kind {
                // fsg_search_pnode_trans: propagate within the same word.
                // No `logs2prob` is added here: that weight only applies
                // when a chain's root is entered (spec §4.2, §4.5).
                PNodeKind::Internal { child } => {
                    let enter_score = out + self.config.pip_in_logspace(&self.logmath);
                    internal_trans.push((*child, enter_score, node.hmm.out_history()));
                }
                // fsg_search_pnode_exit: the word is complete. Score is
                // copied from the HMM's own out_score plus the word
                // insertion penalty (spec §4.3); the arc's own log-prob
                // was already folded in when this chain's root was
                // entered, not added again here.
                PNodeKind::Leaf {
                    word_id,
                    dest_state,
                    rc,
                } => {
                    let score = out + self.config.wip_in_logspace(&self.logmath);
                    if score < best_score + beams.wbeam {
                        continue;
                    }
                    let entry = HistEntry {
                        word_id: Some(*word_id),
                        frame: self.frame,
                        score,
                        pred: node.hmm.out_history(),
                        state: *dest_state,
                        exit_phone: node.ci_ext,
                        lc: CtxtSet::all(self.dict.n_ciphones()),
                        rc: rc.clone(),
                    };
                    word_exits.push(self.history.push(entry));
                }
            }
        }

        let mut next_active: HashSet<usize> = survivors.into_iter().collect();
        for (child, enter_score, pred_hist) in internal_trans {
            lextree
                .node_mut(child)
                .hmm
                .enter(enter_score, pred_hist, self.frame + 1);
            next_active.insert(child);
        }

        // §4.4: null-transition propagation, its own commit gated by wbeam.
        let null_exits = self.null_propagate(&word_exits, best_score);

        // §4.5: cross-word transition from every entry committed this
        // frame, word exits and null-propagation entries alike.
        let mut all_exits = word_exits;
        all_exits.extend(null_exits);
        let next_frame = self.frame + 1;
        let activated = self.cross_word_transition(&all_exits, next_frame);
        next_active.extend(activated);

        self.active = next_active.into_iter().collect();
        self.frame += 1;
        Ok(true)
    }

    /// Commit a new history entry for every FSG state reachable from each
    /// of `exits`' own destination state by one (transitively-closed)
    /// null arc, each gated independently against `best_score` by the
    /// word-exit beam (spec §4.4). Returns the indices of the newly
    /// committed entries; `word_id` is `None` since no word was recognized
    /// by the hop itself.
    fn null_propagate(&mut self, exits: &[usize], best_score: i32) -> Vec<usize> {
        let wbeam = self.beams.effective().wbeam;
        let Some(fsg) = self.fsg_set.current() else {
            return Vec::new();
        };
        let mut committed = Vec::new();
        for &idx in exits {
            let e = self.history.get(idx).clone();
            for d in 0..fsg.n_state() {
                let Some(null_link) = fsg.null_trans(e.state, d) else {
                    continue;
                };
                let score = e.score + null_link.logs2prob;
                if score < best_score + wbeam {
                    continue;
                }
                committed.push(self.history.push(HistEntry {
                    word_id: None,
                    frame: e.frame,
                    score,
                    pred: idx as i32,
                    state: d,
                    exit_phone: e.exit_phone,
                    lc: e.lc.clone(),
                    rc: e.rc.clone(),
                }));
            }
        }
        committed
    }

    /// Activate every cross-word-admissible lextree root reachable from
    /// each of `exits`' own destination state (spec §4.5), entering it at
    /// `frame` with the exiting entry's score plus the root's own
    /// `logs2prob`. Returns the newly activated pnode indices.
    fn cross_word_transition(&mut self, exits: &[usize], frame: i32) -> HashSet<usize> {
        let pip = self.config.pip_in_logspace(&self.logmath);
        let mut activated = HashSet::new();
        let Some(lextree) = self.lextree.as_mut() else {
            return activated;
        };
        for &idx in exits {
            let entry = self.history.get(idx);
            let exit_rc = entry.rc.clone();
            let exit_phone = entry.exit_phone;
            let entry_score = entry.score;
            let state = entry.state;

            for &root in lextree.roots_at(state) {
                let root_lc = lextree
                    .node(root)
                    .lc
                    .clone()
                    .expect("lextree root pnode missing left-context set");
                let root_phone = lextree.node(root).ci_ext;
                if !cross_word_admissible(&exit_rc, root_phone, &root_lc, exit_phone) {
                    continue;
                }
                let root_logs2prob = lextree.node(root).logs2prob;
                let enter_score = entry_score + root_logs2prob + pip;
                lextree
                    .node_mut(root)
                    .hmm
                    .enter(enter_score, idx as i32, frame);
                activated.insert(root);
            }
        }
        activated
    }

    /// Locate the best history entry reaching the FSG's final state,
    /// scanning backward from the last frame actually processed for the
    /// first frame with any committed entries at all, then picking the
    /// highest-scoring final-state entry among exactly that frame (spec
    /// §4.8 steps 1-2). Spec's Open Question flags a subtly different
    /// off-by-one in the original: a backward scan that finds no entry at
    /// or before the target frame must return "no hypothesis" rather than
    /// a stale index; `indices_at_or_before` returning `None` here gives
    /// exactly that, while still scanning multiple frames back rather than
    /// only the single most recent one.
    fn find_exit(&self) -> Option<usize> {
        let fsg = self.fsg_set.current()?;
        let range = self.history.indices_at_or_before(self.frame - 1)?;
        range
            .filter(|&idx| self.history.get(idx).state == fsg.final_state())
            .max_by_key(|&idx| self.history.get(idx).score)
    }

    /// End the utterance and commit the best path to the final state, if
    /// any was found, matching `fsg_search_finish`. Idempotent: calling
    /// `finish` again without an intervening `start` just re-runs
    /// `find_exit` over the same (unchanged) history.
    pub fn finish(&mut self) -> Result<()> {
        self.final_hist = self.find_exit();
        self.final_ = true;
        if self.final_hist.is_none() {
            tracing::warn!(frame = self.frame, "no path reached the final FSG state");
        }
        if let Some(lextree) = &self.lextree {
            let budget = lextree.n_pnode() as u64 * self.frame.max(0) as u64;
            if self.n_hmm_eval > budget {
                tracing::error!(
                    n_hmm_eval = self.n_hmm_eval,
                    budget,
                    "total HMM evaluations for the utterance exceeded n_pnode * n_frame"
                );
            }
        }
        tracing::info!(
            frame = self.frame,
            n_hmm_eval = self.n_hmm_eval,
            n_sen_eval = self.n_sen_eval,
            "utterance finished"
        );
        Ok(())
    }

    /// The recognized word sequence, skipping filler words. When
    /// `bestpath` is configured and the utterance is final, this bypasses
    /// the raw back-trace and rescales through the lattice's best path
    /// instead (spec §4.8); otherwise it walks predecessors from the
    /// committed final history entry back to the dummy start entry.
    pub fn hyp(&mut self) -> Option<String> {
        if self.config.bestpath && self.final_ {
            self.lattice();
            if let Some((_, lattice)) = &self.lattice_cache {
                if let Some(fsg) = self.fsg_set.current() {
                    if let Some(seg) = SegIter::from_lattice(lattice, fsg) {
                        let words: Vec<String> =
                            seg.hyp_words(fsg).map(|s| s.to_string()).collect();
                        return Some(words.join(" "));
                    }
                }
            }
        }
        self.hyp_from_history()
    }

    /// The raw history back-trace hypothesis, ignoring `bestpath`.
    fn hyp_from_history(&self) -> Option<String> {
        let final_idx = self.final_hist?;
        let fsg = self.fsg_set.current()?;
        let mut words = Vec::new();
        let mut cur = final_idx as i32;
        while cur >= 0 {
            let e = self.history.get(cur as usize);
            if let Some(wid) = e.word_id {
                if !fsg.is_filler(wid) {
                    words.push(fsg.word_str(wid).to_string());
                }
            }
            cur = e.pred;
        }
        words.reverse();
        Some(words.join(" "))
    }

    /// Build (or return the cached) word lattice over the committed
    /// history table (spec §4.9). Returns `None` before any word has
    /// exited. Caches by current frame: a second call with no
    /// intervening `step` returns the same object.
    pub fn lattice(&mut self) -> Option<&Lattice> {
        let final_idx = self.final_hist.or_else(|| self.find_exit())?;
        if let Some((f, _)) = &self.lattice_cache {
            if *f == self.frame {
                return self.lattice_cache.as_ref().map(|(_, l)| l);
            }
        }
        let fsg = self.fsg_set.current()?;
        let lattice = Lattice::build(&self.history, fsg, &self.config, &self.logmath, final_idx);
        self.lattice_cache = Some((self.frame, lattice));
        self.lattice_cache.as_ref().map(|(_, l)| l)
    }

    /// Segmentation over the chosen hypothesis (spec §4.10): the
    /// lattice's bestpath rescore when `bestpath` is configured and the
    /// utterance is final, the raw history back-trace otherwise.
    pub fn seg_iter(&mut self) -> Option<SegIter> {
        if self.config.bestpath && self.final_ {
            self.lattice();
            if let Some((_, lattice)) = &self.lattice_cache {
                if let Some(fsg) = self.fsg_set.current() {
                    if let Some(seg) = SegIter::from_lattice(lattice, fsg) {
                        return Some(seg);
                    }
                }
            }
        }
        let final_idx = self.final_hist?;
        let fsg = self.fsg_set.current()?;
        Some(SegIter::from_history(&self.history, fsg, final_idx))
    }

    pub fn beam_factor(&self) -> f64 {
        self.beams.beam_factor()
    }

    pub fn n_active(&self) -> usize {
        self.active.len()
    }

    pub fn is_final(&self) -> bool {
        self.final_
    }

    /// Posterior score of the committed hypothesis, `WORST_SCORE` if no
    /// path reached the final state.
    pub fn prob(&self) -> i32 {
        match self.final_hist {
            Some(idx) => self.history.get(idx).score,
            None => WORST_SCORE,
        }
    }

    pub fn final_hist(&self) -> Option<usize> {
        self.final_hist
    }

    pub fn history(&self) -> &HistoryTable {
        &self.history
    }

    pub fn dict(&self) -> &D {
        &self.dict
    }

    pub fn acoustic_mut(&mut self) -> &mut A {
        &mut self.acoustic
    }
}
