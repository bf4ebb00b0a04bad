//! Decoder configuration (spec §6, "Configuration options consumed").
//!
//! The teacher crate's `PsConfig` proxies a stringly-typed `cmd_ln_t` key/
//! value store, because it sits on top of one in C. There is no longer a
//! C config object to proxy, so this is a plain typed struct instead;
//! fields and defaults match spec §6 exactly. `-fsg` (the path to an
//! initial grammar) is intentionally absent: FSG file parsing is out of
//! scope, so the embedding application builds an [`crate::fsg::FsgModel`]
//! itself and registers it via `fsg_set_add`.

/// Tunable search parameters for one decoder instance.
///
/// Probabilities (`beam`, `pbeam`, `wbeam`, `pip`, `wip`, `silprob`,
/// `fillprob`) are linear on construction and log-mapped (scaled by `lw`
/// where the original applies the language weight) once via
/// [`DecoderConfig::beams_in_logspace`]; `maxhmmpf` and `bestpath` are
/// used as-is.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// State-level survival beam (linear probability, e.g. `1e-64`).
    pub beam: f64,
    /// Phone-exit beam.
    pub pbeam: f64,
    /// Word-exit / null-propagation beam.
    pub wbeam: f64,
    /// Language weight multiplier applied to FSG arc log-probs.
    pub lw: f32,
    /// Phone-insertion penalty (linear probability).
    pub pip: f32,
    /// Word-insertion penalty (linear probability).
    pub wip: f32,
    /// Hard cap on active HMMs per frame; `-1` disables the cap.
    pub maxhmmpf: i32,
    /// Enable post-pass bestpath rescoring over the lattice.
    pub bestpath: bool,
    /// Acoustic-score divisor used when computing posteriors.
    pub ascale: f32,
    /// Auto-add silence/filler self-loops to FSGs registered with
    /// `fsg_set_add`.
    pub fsgusefiller: bool,
    /// Auto-add dictionary alternate pronunciations to FSGs registered
    /// with `fsg_set_add`.
    pub fsgusealtpron: bool,
    /// Self-loop probability used when synthesizing silence arcs; also the
    /// lattice filler-bypass penalty charged for each `<sil>` entry a
    /// lattice node/edge is built across (spec §4.9 Post-processing).
    pub silprob: f32,
    /// Self-loop probability used when synthesizing other filler arcs;
    /// also the lattice filler-bypass penalty charged for each non-silence
    /// filler entry a lattice node/edge is built across.
    pub fillprob: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam: 1e-48,
            pbeam: 1e-40,
            wbeam: 1e-30,
            lw: 6.5,
            pip: 1.0,
            wip: 0.65,
            maxhmmpf: 30_000,
            bestpath: true,
            ascale: 20.0,
            fsgusefiller: true,
            fsgusealtpron: true,
            silprob: 0.005,
            fillprob: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Beams {
    pub beam: i32,
    pub pbeam: i32,
    pub wbeam: i32,
}

impl DecoderConfig {
    /// Log-map the three search beams through `logmath`, matching
    /// `fsg_search_init`'s `beam_orig = logmath_log(..., cmd_ln_float64_r(config, "-beam"))`.
    pub fn beams_in_logspace(&self, logmath: &crate::logmath::LogMath) -> Beams {
        Beams {
            beam: logmath.log(self.beam),
            pbeam: logmath.log(self.pbeam),
            wbeam: logmath.log(self.wbeam),
        }
    }

    /// Phone-insertion penalty in log space, scaled by the language weight,
    /// matching `fsgs->pip = logmath_log(..., pip) * fsgs->lw`.
    pub fn pip_in_logspace(&self, logmath: &crate::logmath::LogMath) -> i32 {
        (logmath.log(self.pip as f64) as f32 * self.lw) as i32
    }

    /// Word-insertion penalty in log space, scaled by the language weight.
    pub fn wip_in_logspace(&self, logmath: &crate::logmath::LogMath) -> i32 {
        (logmath.log(self.wip as f64) as f32 * self.lw) as i32
    }

    /// Lattice filler-bypass penalty charged per bypassed `<sil>` entry.
    pub fn silprob_in_logspace(&self, logmath: &crate::logmath::LogMath) -> i32 {
        (logmath.log(self.silprob as f64) as f32 * self.lw) as i32
    }

    /// Lattice filler-bypass penalty charged per bypassed non-silence
    /// filler entry.
    pub fn fillprob_in_logspace(&self, logmath: &crate::logmath::LogMath) -> i32 {
        (logmath.log(self.fillprob as f64) as f32 * self.lw) as i32
    }
}
