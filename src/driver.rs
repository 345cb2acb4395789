//! Host driver (spec.md §4.5): validates shape, copies the partition tensor
//! to device, derives the alphabet bound `K` by parallel reduction, checks
//! the scratch footprint against device limits, launches the scoring
//! kernel, and marshals the score buffer back.

use crate::kernel::ari;
use crate::kernel::reduction::label_extent;
use crate::scratch::ScratchLayout;
use crate::{Context, Error};

/// Computes the Adjusted Rand Index for every ordered pairing of partition
/// variants across every unordered feature pair in a partition tensor.
///
/// `parts` is a row-major `(f, p, n)` tensor of partition labels: `f`
/// features, `p` partition variants per feature, `n` objects, every label
/// in `[0, K)` for some inferred `K = max(labels) + 1`. The caller retains
/// ownership; this function copies it to device and does not keep a
/// reference after returning.
///
/// Returns a length-`f*(f-1)/2*p*p` vector of ARI scores. Decompose a
/// result index `b` with [`crate::index::decompose_work_item`] (not part of
/// the public API: callers index into the result the same way this
/// function orders it) to recover `(i, j, m, n)`: lexicographic by `(i, j)`
/// with `i < j` at the top level, then by `(m, n)` in row-major `p x p`
/// order.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if `parts` is empty, any of `f`, `p`, `n` is
///   zero, `parts.len() != f * p * n`, or any label in `parts` is negative.
/// - [`Error::ResourceExceeded`] if the per-workgroup scratch footprint for
///   the inferred `K` exceeds the device's workgroup storage limit — the
///   remedy is to relabel partitions densely from 0 to shrink `K`.
/// - [`Error::Device`] for any other allocation, dispatch, or
///   synchronization failure.
pub fn compute_ari(ctx: &Context, parts: &[i32], f: usize, p: usize, n: usize) -> Result<Vec<f32>, Error> {
    if parts.is_empty() || f == 0 || p == 0 || n == 0 {
        return Err(Error::InvalidInput(
            "partition tensor must be non-empty and f, p, n must all be positive".into(),
        ));
    }

    let expected_len = f
        .checked_mul(p)
        .and_then(|v| v.checked_mul(n))
        .ok_or_else(|| Error::InvalidInput("f * p * n overflows".into()))?;
    if parts.len() != expected_len {
        return Err(Error::InvalidInput(format!(
            "partition tensor length {} does not match f*p*n = {expected_len}",
            parts.len()
        )));
    }

    let f_u32 = u32::try_from(f).map_err(|_| Error::InvalidInput("f exceeds u32::MAX".into()))?;
    let p_u32 = u32::try_from(p).map_err(|_| Error::InvalidInput("p exceeds u32::MAX".into()))?;
    let n_u32 = u32::try_from(n).map_err(|_| Error::InvalidInput("n exceeds u32::MAX".into()))?;

    let buffer = ctx.create_buffer_from_slice(parts)?;

    // spec.md §9(c): validated here rather than silently dropped by the
    // kernel's accumulation phase.
    let extent = label_extent::reduce(ctx, &buffer, parts.len())?;
    if extent.any_negative {
        return Err(Error::InvalidInput(
            "partition tensor contains a negative label".into(),
        ));
    }

    ScratchLayout::new(extent.k).validate(ctx.max_workgroup_storage_size())?;

    let scores = ari::score_all(ctx, &buffer, f_u32, p_u32, n_u32, extent.k)?;
    ctx.release_buffer(buffer.into_inner());

    let result = ctx.read_buffer(&scores);
    ctx.release_buffer(scores.into_inner());
    result
}
