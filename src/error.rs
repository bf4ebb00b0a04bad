use thiserror::Error;

/// Recoverable errors surfaced at decoder API boundaries.
///
/// Invariant violations inside a frame (spec §7, "evaluated HMMs > total
/// lextree pnodes") are not represented here: those are fatal and raised
/// via `panic!`/`assert!`, since they indicate lextree/active-set
/// corruption and are not recoverable by the caller.
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("FSG '{0}' not known; cannot make it current")]
    UnknownFsg(String),

    #[error("FSG '{0}' to be deleted not found")]
    FsgNotFound(String),

    #[error("no current FSG selected; call fsg_set_select before reinit")]
    NoCurrentFsg,

    #[error("word '{0}' not present in dictionary")]
    UnknownWord(String),

    #[error("FSG state {0} is out of range (n_state = {1})")]
    StateOutOfRange(u32, u32),
}

pub type Result<T> = std::result::Result<T, DecoderError>;
