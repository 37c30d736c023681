//! Error types for the template browsing engine.
//!
//! Errors are layered the same way the crate is: transport failures are
//! wrapped into [`StoreError`] by the array client, analysis errors are pure
//! and store-free, and the session layer splits everything into session-fatal
//! ([`SessionError`]) versus row-local ([`RowError`]) conditions.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Transport layer
// ---------------------------------------------------------------------------

/// A byte-store request failed at the transport level (network, DNS, HTTP
/// status other than "not found").
///
/// Key absence is *not* an error: transports report it as `Ok(None)` so the
/// array client can distinguish "missing" from "unreachable".
#[derive(Debug, Clone, Error)]
#[error("request for `{key}` failed: {reason}")]
pub struct TransportError {
    /// Store key the request was addressed to.
    pub key: String,
    /// Human-readable failure cause from the underlying transport.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Array store layer
// ---------------------------------------------------------------------------

/// Errors raised while resolving or reading chunked arrays.
///
/// No retries happen at this layer; callers decide whether a
/// [`StoreError::Connection`] is worth retrying.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store connection failed: {0}")]
    Connection(#[from] TransportError),

    /// No group or array exists at the given path.
    #[error("no array or group at `{0}`")]
    NotFound(String),

    /// A slice spec named a different number of axes than the array has.
    #[error("slice spec names {given} axes but `{path}` has rank {rank}")]
    SliceShape {
        path: String,
        rank: usize,
        given: usize,
    },

    /// A slice index exceeded the array's declared extent along an axis.
    #[error("index {index} out of range for axis {axis} of `{path}` (extent {extent})")]
    OutOfRange {
        path: String,
        axis: usize,
        index: usize,
        extent: usize,
    },

    /// The array uses a dtype, compressor, byte order, or layout this client
    /// does not read.
    #[error("unsupported array encoding: {0}")]
    UnsupportedEncoding(String),

    /// A metadata document or chunk object was present but malformed.
    #[error("malformed store metadata: {0}")]
    InvalidMetadata(String),
}

// ---------------------------------------------------------------------------
// Analysis layer
// ---------------------------------------------------------------------------

/// Errors from the pure per-unit signal computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A template slice had zero samples; amplitudes would be meaningless.
    #[error("template slice contains no samples")]
    EmptyTensor,

    /// The active-channel threshold must lie in (0, 1].
    #[error("active-channel threshold {0} is outside (0, 1]")]
    InvalidThreshold(f32),

    /// An amplitude vector with no channels has no best channel.
    #[error("amplitude vector is empty")]
    EmptyAmplitudeVector,
}

// ---------------------------------------------------------------------------
// Session layer
// ---------------------------------------------------------------------------

/// Session-fatal failures.
///
/// Without probe geometry, unit metadata, or the templates array itself no
/// row can be computed, so these surface as a single top-level failure
/// instead of per-row states.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required field is absent from the store.
    #[error("required store field `{0}` is unavailable")]
    MetadataUnavailable(String),

    /// Probe geometry / channel ids disagree with the templates array about
    /// the channel count.
    #[error("channel count mismatch: expected {expected}, found {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    /// The templates array does not have unit x sample x channel shape.
    #[error("templates array has rank {0}, expected 3 (unit x sample x channel)")]
    BadTemplateRank(usize),

    /// The session configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A store failure during session bring-up.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Row-local failures.
///
/// One unit failing to load or analyze must never block sibling rows; the
/// affected row transitions to an errored state carrying one of these.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// The metadata vectors have no entry for this unit index.
    #[error("unit {0} has no metadata entry")]
    MissingMetadata(usize),
}
