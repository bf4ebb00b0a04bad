//! Integer log-probability arithmetic.
//!
//! The decoder never compares or combines probabilities directly; every
//! score is a fixed-point integer logarithm in a configurable base, and
//! "survival" is always a single `>=` comparison against a threshold
//! (spec §9, "Beam arithmetic"). This module reimplements the shape of the
//! teacher crate's `LogMath` wrapper (`log`/`exp`/`add`/base) natively in
//! floating point rather than proxying a C log-add table, since this
//! decoder no longer sits on top of an external acoustic library.

/// A score low enough that no reachable state ever legitimately produces
/// it, chosen with enough headroom that `WORST_SCORE + WORST_SCORE`
/// (or any sum of a handful of real scores) does not wrap a 32-bit int.
pub const WORST_SCORE: i32 = i32::MIN / 4;

/// Add two log-probability scores (score composition), saturating instead
/// of overflowing when one operand is already `WORST_SCORE`.
#[inline]
pub fn score_add(a: i32, b: i32) -> i32 {
    a.saturating_add(b)
}

/// Converts between linear probabilities and a fixed-point integer log
/// space in a configurable base, mirroring `logmath_t` from the original
/// `sphinxbase`/teacher crate.
#[derive(Debug, Clone, Copy)]
pub struct LogMath {
    /// log(base), used to rescale natural logarithms into this base.
    log_base: f64,
}

impl LogMath {
    /// `base` is the B in which computation is carried out; values close
    /// to 1.0 (e.g. 1.0001) give fine-grained integer log resolution.
    pub fn new(base: f64) -> Self {
        assert!(base > 1.0, "logmath base must be > 1.0");
        Self {
            log_base: base.ln(),
        }
    }

    /// The default base used throughout the decoder when the embedding
    /// application does not otherwise configure one.
    pub fn default_base() -> Self {
        Self::new(1.0001)
    }

    pub fn base(&self) -> f64 {
        self.log_base.exp()
    }

    /// Convert a linear probability (0.0, 1.0] to an integer log in this base.
    pub fn log(&self, p: f64) -> i32 {
        if p <= 0.0 {
            return WORST_SCORE;
        }
        (p.ln() / self.log_base).round() as i32
    }

    /// Convert an integer log in this base back to a linear probability.
    pub fn exp(&self, logb_p: i32) -> f64 {
        (logb_p as f64 * self.log_base).exp()
    }

    /// `log(exp(p) + exp(q))`, computed without leaving log space.
    pub fn add(&self, logb_p: i32, logb_q: i32) -> i32 {
        if logb_p == WORST_SCORE {
            return logb_q;
        }
        if logb_q == WORST_SCORE {
            return logb_p;
        }
        let (hi, lo) = if logb_p >= logb_q {
            (logb_p, logb_q)
        } else {
            (logb_q, logb_p)
        };
        let diff = (lo - hi) as f64 * self.log_base;
        hi + (diff.exp().ln_1p() / self.log_base).round() as i32
    }

    /// Convert a natural log value directly to this base's integer log.
    pub fn ln_to_log(&self, log_p: f64) -> i32 {
        (log_p / self.log_base).round() as i32
    }

    /// Convert this base's integer log back to a natural log value.
    pub fn log_to_ln(&self, logb_p: i32) -> f64 {
        logb_p as f64 * self.log_base
    }
}

impl Default for LogMath {
    fn default() -> Self {
        Self::default_base()
    }
}
