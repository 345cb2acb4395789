//! Pure arithmetic mapping a linear work-group identifier to the partition
//! pair it must score.
//!
//! Negligible share of the total compute budget, but its correctness pins
//! down the meaning of every entry in the output score buffer, so it is
//! implemented twice: here, in plain Rust, for host-side validation and
//! testing; and again as a WGSL device function embedded in
//! [`crate::kernel::ari`]'s shader source, since the decomposition of a
//! workgroup's own id into `(i, j, m, n)` has to happen on-device — each
//! workgroup only ever sees its own `workgroup_id`.

/// Splits a flat index into row and column under a rectangular shape with
/// `cols` columns: `(flat / cols, flat % cols)`.
#[must_use]
pub(crate) fn unravel(flat: u32, cols: u32) -> (u32, u32) {
    (flat / cols, flat % cols)
}

/// Computes the flat index of `(x, y)` (with `x < y`) in a row-major
/// enumeration of the strict upper triangle (no diagonal) of an `n x n`
/// matrix.
///
/// Inverse of [`triangular_inverse`]; used by this crate only to verify the
/// round-trip property, not on the hot path.
#[must_use]
pub(crate) fn triangular_index(x: u32, y: u32, n: u32) -> u32 {
    debug_assert!(x < y && y < n);
    let x = u64::from(x);
    let y = u64::from(y);
    let n = u64::from(n);
    // Number of pairs entirely before row x, plus the offset of y within row x.
    let before_rows = x * n - x * (x + 1) / 2;
    (before_rows + (y - x - 1)) as u32
}

/// Inverts [`triangular_index`]: given the object count `n` and a flat index
/// `idx` into the strict upper triangle of an `n x n` matrix, recovers
/// `(x, y)` with `0 <= x < y < n`.
///
/// Uses the closed-form quadratic solution spec'd for the kernel's device-
/// side index function, with single-precision `sqrt` followed by an exact
/// correction: the closed form is evaluated in `f32` (matching the
/// precision available in the WGSL device function this mirrors), then the
/// result is checked by recomputing `idx` from the candidate `(x, y)` and
/// adjusting `x` by +/-1 if the forward mapping disagrees.
#[must_use]
pub(crate) fn triangular_inverse(idx: u32, n: u32) -> (u32, u32) {
    let nf = n as f32;
    let idxf = idx as f32;

    let b = 1.0 - 2.0 * nf;
    let disc = b * b - 8.0 * idxf;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut x = ((-b - disc.sqrt()) / 2.0).floor() as i64;

    let solve_y = |x: i64| -> i64 {
        let xf = x as f32;
        let yf = idxf + xf * (b + xf + 2.0) / 2.0 + 1.0;
        #[allow(clippy::cast_possible_truncation)]
        {
            yf.round() as i64
        }
    };

    let mut y = solve_y(x);

    // Single-precision sqrt can be off by one ULP near the boundary between
    // rows; recompute idx from the candidate (x, y) and walk x into place.
    let forward = |x: i64, y: i64| -> i64 {
        if x < 0 || y <= x || y >= i64::from(n) {
            return -1;
        }
        #[allow(clippy::cast_sign_loss)]
        i64::from(triangular_index(x as u32, y as u32, n))
    };

    let target = i64::from(idx);
    let mut guard = 0;
    while forward(x, y) != target && guard < 4 {
        if forward(x, y) < target {
            x += 1;
        } else {
            x -= 1;
        }
        y = solve_y(x);
        guard += 1;
    }

    #[allow(clippy::cast_sign_loss)]
    (x as u32, y as u32)
}

/// Decomposes a linear work-group identifier `b` into the partition pair it
/// scores: `(i, j, m, n)` with `0 <= i < j < f` and `0 <= m, n < p`.
///
/// `f = b / p^2`, the remainder splits into `(m, n)` by [`unravel`], and `f`
/// maps to `(i, j)` via [`triangular_inverse`] over the `num_features x
/// num_features` upper triangle.
#[must_use]
pub(crate) fn decompose_work_item(b: u32, num_features: u32, num_partitions: u32) -> WorkItem {
    let p_sq = num_partitions * num_partitions;
    let feature_pair_index = b / p_sq;
    let partition_flat = b % p_sq;
    let (m, n) = unravel(partition_flat, num_partitions);
    let (i, j) = triangular_inverse(feature_pair_index, num_features);

    WorkItem { i, j, m, n }
}

/// The partition pair a single workgroup is assigned to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkItem {
    /// First feature index, `i < j`.
    pub(crate) i: u32,
    /// Second feature index, `i < j`.
    pub(crate) j: u32,
    /// Partition variant within feature `i`.
    pub(crate) m: u32,
    /// Partition variant within feature `j`.
    pub(crate) n: u32,
}

/// Total number of output work items (= output score count `A`) for a
/// tensor with `num_features` features and `num_partitions` partition
/// variants per feature.
#[must_use]
pub(crate) fn work_item_count(num_features: u32, num_partitions: u32) -> u64 {
    let f = u64::from(num_features);
    let p = u64::from(num_partitions);
    (f * (f - 1) / 2) * p * p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unravel() {
        assert_eq!(unravel(7, 3), (2, 1));
        assert_eq!(unravel(0, 3), (0, 0));
        assert_eq!(unravel(8, 3), (2, 2));
    }

    #[test]
    fn test_triangular_index_known_values() {
        // n=4 upper triangle enumeration: (0,1)=0 (0,2)=1 (0,3)=2 (1,2)=3 (1,3)=4 (2,3)=5
        assert_eq!(triangular_index(0, 1, 4), 0);
        assert_eq!(triangular_index(0, 2, 4), 1);
        assert_eq!(triangular_index(0, 3, 4), 2);
        assert_eq!(triangular_index(1, 2, 4), 3);
        assert_eq!(triangular_index(1, 3, 4), 4);
        assert_eq!(triangular_index(2, 3, 4), 5);
    }

    #[test]
    fn test_triangular_inverse_known_values() {
        assert_eq!(triangular_inverse(0, 4), (0, 1));
        assert_eq!(triangular_inverse(1, 4), (0, 2));
        assert_eq!(triangular_inverse(2, 4), (0, 3));
        assert_eq!(triangular_inverse(3, 4), (1, 2));
        assert_eq!(triangular_inverse(4, 4), (1, 3));
        assert_eq!(triangular_inverse(5, 4), (2, 3));
    }

    #[test]
    fn test_triangular_round_trip_small_n() {
        for n in 2..64u32 {
            let total = n * (n - 1) / 2;
            for idx in 0..total {
                let (x, y) = triangular_inverse(idx, n);
                assert!(x < y, "n={n} idx={idx} gave x={x} y={y}");
                assert!(y < n, "n={n} idx={idx} gave x={x} y={y}");
                assert_eq!(
                    triangular_index(x, y, n),
                    idx,
                    "round trip failed for n={n} idx={idx}: got (x={x}, y={y})"
                );
            }
        }
    }

    #[test]
    fn test_triangular_round_trip_large_n() {
        // Exercises the single-precision-sqrt correction loop near larger n,
        // where f32 rounding is most likely to land on the wrong row.
        for n in [500u32, 1000, 4096] {
            let total = u64::from(n) * u64::from(n - 1) / 2;
            for idx in [0u64, 1, total / 2, total - 2, total - 1] {
                #[allow(clippy::cast_possible_truncation)]
                let idx32 = idx as u32;
                let (x, y) = triangular_inverse(idx32, n);
                assert!(x < y && y < n);
                assert_eq!(triangular_index(x, y, n), idx32);
            }
        }
    }

    #[test]
    fn test_decompose_work_item() {
        // f=3, p=2: feature pairs (0,1),(0,2),(1,2); p^2=4 partition combos each.
        let item = decompose_work_item(0, 3, 2);
        assert_eq!(item, WorkItem { i: 0, j: 1, m: 0, n: 0 });

        let item = decompose_work_item(3, 3, 2);
        assert_eq!(item, WorkItem { i: 0, j: 1, m: 1, n: 1 });

        let item = decompose_work_item(4, 3, 2);
        assert_eq!(item, WorkItem { i: 0, j: 2, m: 0, n: 0 });

        let item = decompose_work_item(8, 3, 2);
        assert_eq!(item, WorkItem { i: 1, j: 2, m: 0, n: 0 });
    }

    #[test]
    fn test_work_item_count() {
        assert_eq!(work_item_count(2, 1), 1);
        assert_eq!(work_item_count(3, 2), 12);
        assert_eq!(work_item_count(4, 3), 54);
    }
}
