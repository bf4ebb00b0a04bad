//! Frame-synchronous Viterbi decoding over a finite-state grammar (FSG).
//!
//! [`decoder::FsgDecoder`] is the entry point: register one or more
//! [`fsg::FsgModel`]s, select one, `start`/`step`/`finish` an utterance,
//! then read `hyp`/`prob`, or build a [`lattice::Lattice`] over the
//! history table for a bestpath rescoring pass.

pub mod acoustic;
pub mod beam;
pub mod config;
pub mod ctxt;
pub mod decoder;
pub mod dict;
pub mod error;
pub mod fsg;
pub mod history;
pub mod hmm;
pub mod lattice;
pub mod lextree;
pub mod logmath;
pub mod seg_iter;

pub use acoustic::AcousticModel;
pub use config::DecoderConfig;
pub use decoder::{FsgDecoder, FsgSet};
pub use dict::{Dictionary, SimpleDictionary};
pub use error::{DecoderError, Result};
pub use fsg::FsgModel;
pub use lattice::Lattice;
pub use logmath::LogMath;
pub use seg_iter::{Seg, SegIter};
