//! Error types for the ARI scoring engine.
//!
//! - [`Error`] — top-level error type, matching the three failure kinds a
//!   caller of [`compute_ari`](crate::compute_ari) can observe.

/// Top-level error type for the ARI scoring engine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Caller-supplied arguments violate a precondition: null/empty buffer,
    /// a zero dimension, or (once the alphabet-bound reduction has run) a
    /// negative label somewhere in the partition tensor.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A failure reported by the accelerator runtime during allocation,
    /// copy, shader compilation, launch, or synchronization.
    #[error("device error: {0}")]
    Device(String),

    /// The per-workgroup scratch footprint required for the inferred
    /// alphabet bound `K` exceeds the device's workgroup storage limit.
    ///
    /// The caller's remedy is to reduce the label alphabet, e.g. by
    /// relabeling partitions densely from 0.
    #[error("scratch footprint {needed} bytes exceeds device limit of {limit} bytes (K={k})")]
    ResourceExceeded {
        /// Computed scratch footprint in bytes.
        needed: u64,
        /// Device's per-workgroup storage limit in bytes.
        limit: u64,
        /// The alphabet bound that produced this footprint.
        k: u32,
    },
}
