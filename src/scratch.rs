//! Per-workgroup scratch footprint accounting.
//!
//! The contingency matrix, its marginals, and the pair-confusion matrix are
//! all workgroup-private scratch (`var<workgroup>` storage in the kernel).
//! Their combined size depends on the inferred alphabet bound `K` and must
//! be checked against the device's per-workgroup storage limit before
//! launch — a device that happens to support a smaller limit than the
//! inferred `K` requires should fail fast with a clear diagnostic rather
//! than launch a kernel the device would reject.

use crate::Error;

/// Size in bytes of one contingency/marginal/pair-confusion scratch cell.
///
/// Contingency cells are `atomic<u32>`; marginals are `atomic<u32>`; the
/// pair-confusion cells are filled by a single thread from `i64` locals but
/// are never themselves stored in scratch memory, so they do not contribute
/// here — see [`ScratchLayout::footprint_bytes`].
const CELL_BYTES: u64 = 4;

/// Describes the workgroup-private scratch layout for a contingency
/// reduction over an alphabet of size `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScratchLayout {
    /// Alphabet bound this layout was sized for.
    k: u32,
}

impl ScratchLayout {
    /// Builds the scratch layout for alphabet bound `k`.
    pub(crate) fn new(k: u32) -> Self {
        Self { k }
    }

    /// Computes the per-workgroup scratch footprint in bytes:
    /// `K^2 * 4 + 2K * 4 + 4 * 4` — the `K x K` contingency matrix, the two
    /// length-`K` marginal vectors, and the 4-entry pair-confusion matrix.
    #[must_use]
    pub(crate) fn footprint_bytes(&self) -> u64 {
        let k = u64::from(self.k);
        k * k * CELL_BYTES + 2 * k * CELL_BYTES + 4 * CELL_BYTES
    }

    /// Validates the footprint against a device's per-workgroup storage
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceExceeded`] if the footprint exceeds `limit`.
    pub(crate) fn validate(&self, limit: u64) -> Result<(), Error> {
        let needed = self.footprint_bytes();
        if needed > limit {
            return Err(Error::ResourceExceeded {
                needed,
                limit,
                k: self.k,
            });
        }
        Ok(())
    }
}
