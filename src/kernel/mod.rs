//! Compute kernels for ARI scoring.

pub(crate) mod ari;
pub(crate) mod reduction;

/// Splits `needed` workgroups into a 2D dispatch grid that fits under a
/// device's per-dimension workgroup limit, returning `(total, wg_x, wg_y)`
/// with `total = wg_x * wg_y >= needed`.
///
/// Shared by any kernel whose natural dispatch count (label-extent
/// reduction passes, one workgroup per ARI score) can exceed
/// `max_compute_workgroups_per_dimension` on a single axis. Extra cells
/// beyond `needed` are padding lanes the kernel must guard against.
pub(crate) fn split_dispatch(needed: u32, max_dim: u32) -> (u32, u32, u32) {
    let needed = needed.max(1);
    let wg_x = needed.min(max_dim);
    let wg_y = needed.div_ceil(wg_x);
    (wg_x * wg_y, wg_x, wg_y)
}
