//! The cooperative scoring kernel: contingency builder (spec.md §4.2), pair-
//! confusion reducer (§4.3), and ARI finalizer (§4.4), fused into one WGSL
//! entry point because all three share the same workgroup-private scratch
//! memory across a sequence of barriers.
//!
//! One dispatched workgroup computes one output score. `workgroup_id`
//! supplies the linear work-item id `b`; the index demultiplexer
//! ([`crate::index`]) is mirrored here as a WGSL device function, since the
//! decomposition of `b` into `(i, j, m, n)` has to happen on-device — each
//! workgroup only ever sees its own id.
//!
//! Grounded on the teacher's `kernel::reduction::sum` tree-reduction kernel
//! for the overall shape (Rust function builds a parameterized WGSL source,
//! caches the pipeline, dispatches, reads back) and on
//! `kernel::reduction::label_extent` in this crate for the 2D dispatch-grid
//! splitting needed when the work-item count exceeds one dispatch dimension.

use crate::device::{Buffer, Context};
use crate::kernel::split_dispatch;
use crate::Error;

/// Threads per workgroup (`T` in spec.md §4.2/§4.5).
const WORKGROUP_SIZE: u32 = 256;

/// Tile size `S` for the tiled contingency variant: the staging buffers hold
/// `TILE_SIZE` elements each for the two label vectors, `TILE_SIZE * 4 * 2`
/// bytes of workgroup storage (16 KiB at the spec's `S = 2048`). Mandatory
/// whenever `N > TILE_SIZE` (spec.md §4.2).
const TILE_SIZE: u32 = 2048;

/// Launches one workgroup per output score and reads the score buffer back.
///
/// `parts` holds the full `(f, p, n)` partition tensor, row-major, already
/// resident on device. `k` is the alphabet bound from the label-extent
/// reduction.
///
/// # Errors
///
/// Returns [`Error::Device`] if the work-item count overflows a `u32`
/// dispatch count, or if shader compilation, dispatch, or readback fails.
pub(crate) fn score_all(
    ctx: &Context,
    parts: &Buffer<i32>,
    f: u32,
    p: u32,
    n: u32,
    k: u32,
) -> Result<Buffer<f32>, Error> {
    let total_items = crate::index::work_item_count(f, p);
    let a = u32::try_from(total_items)
        .map_err(|_| Error::Device("work-item count exceeds a single dispatch's u32 range".into()))?;

    let out = ctx.create_buffer::<f32>(a as usize)?;
    if a == 0 {
        return Ok(out);
    }

    let max_dim = ctx.max_workgroups_per_dimension();
    let (_, wg_x, wg_y) = split_dispatch(a, max_dim);

    let tiled = n > TILE_SIZE;
    let pipeline_key = format!(
        "kernel::ari::score::{}::k{k}",
        if tiled { "tiled" } else { "direct" }
    );

    let pipeline = ctx.get_or_create_pipeline(&pipeline_key, |device| {
        let source = shader_source(k, tiled);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ari_score"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ari_score"),
            layout: None,
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        })
    });

    let params = Params { f, p, n, k, a };
    let uniform = ctx.create_uniform_buffer(&params);

    let bind_group_layout = pipeline.get_bind_group_layout(0);
    let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: parts.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: out.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform.as_entire_binding(),
            },
        ],
    });

    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(wg_x, wg_y, 1);
    }
    ctx.queue().submit(Some(encoder.finish()));
    ctx.sync()?;

    Ok(out)
}

/// Uniform parameters shared by every workgroup in a `compute_ari` call.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    f: u32,
    p: u32,
    n: u32,
    k: u32,
    /// Total work-item count `A`; workgroups with `b >= a` exit immediately
    /// (padding lanes introduced by [`split_dispatch`]'s 2D packing).
    a: u32,
}

/// Builds the WGSL source for the fused scoring kernel, parameterized by
/// the alphabet bound `k` (scratch array sizes are compile-time in WGSL)
/// and whether the tiled or direct contingency-accumulation variant runs.
fn shader_source(k: u32, tiled: bool) -> String {
    let kk = k * k;

    let accumulate = if tiled {
        tiled_accumulate_body()
    } else {
        direct_accumulate_body()
    };

    let staging_decls = if tiled {
        format!(
            "var<workgroup> staged_a: array<i32, {TILE_SIZE}>;\n\
             var<workgroup> staged_b: array<i32, {TILE_SIZE}>;\n"
        )
    } else {
        String::new()
    };

    format!(
        r"
enable i64;

struct Params {{
    f: u32,
    p: u32,
    n: u32,
    k: u32,
    a: u32,
}}

@group(0) @binding(0) var<storage, read> parts: array<i32>;
@group(0) @binding(1) var<storage, read_write> out: array<f32>;
@group(0) @binding(2) var<uniform> params: Params;

var<workgroup> contingency: array<atomic<u32>, {kk}>;
var<workgroup> row_sum: array<atomic<u32>, {k}>;
var<workgroup> col_sum: array<atomic<u32>, {k}>;
{staging_decls}
fn unravel(flat: u32, cols: u32) -> vec2<u32> {{
    return vec2<u32>(flat / cols, flat % cols);
}}

// Mirrors index::triangular_index on the host: the flat position of (x, y)
// in a row-major enumeration of the strict upper triangle (x < y) of an
// n x n matrix. Evaluated in i64 so the forward-recomputation correction
// below is exact, never float-rounded.
fn triangular_index_i64(x: u32, y: u32, n: u32) -> i64 {{
    let xi = i64(x);
    let yi = i64(y);
    let ni = i64(n);
    let before_rows = xi * ni - xi * (xi + i64(1)) / i64(2);
    return before_rows + (yi - xi - i64(1));
}}

fn forward_index(x: i32, y: i32, n: i32) -> i64 {{
    if (x < 0 || y <= x || y >= n) {{
        return i64(-1);
    }}
    return triangular_index_i64(u32(x), u32(y), u32(n));
}}

fn solve_y(x: i32, b: f32, idxf: f32) -> i32 {{
    let xf = f32(x);
    let yf = idxf + xf * (b + xf + 2.0) / 2.0 + 1.0;
    return i32(round(yf));
}}

// Mirrors index::triangular_inverse on the host: closed-form single-
// precision solve, then an exact i64 correction loop (spec.md §4.1).
fn triangular_inverse(idx: u32, n: u32) -> vec2<u32> {{
    let nf = f32(n);
    let idxf = f32(idx);
    let b = 1.0 - 2.0 * nf;
    let disc = b * b - 8.0 * idxf;
    var x = i32(floor((-b - sqrt(disc)) / 2.0));
    var y = solve_y(x, b, idxf);

    let target = i64(idx);
    var guard = 0u;
    loop {{
        if (guard >= 4u) {{ break; }}
        let fwd = forward_index(x, y, i32(n));
        if (fwd == target) {{ break; }}
        if (fwd < target) {{ x = x + 1; }} else {{ x = x - 1; }}
        y = solve_y(x, b, idxf);
        guard = guard + 1u;
    }}

    return vec2<u32>(u32(x), u32(y));
}}

@compute @workgroup_size({WORKGROUP_SIZE})
fn main(
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) num_wg: vec3<u32>,
) {{
    let tid = lid.x;
    let b = wid.x + wid.y * num_wg.x;
    if (b >= params.a) {{
        return;
    }}

    let p_sq = params.p * params.p;
    let feature_pair_index = b / p_sq;
    let partition_flat = b % p_sq;
    let mn = unravel(partition_flat, params.p);
    let ij = triangular_inverse(feature_pair_index, params.f);

    let offset_a = (ij.x * params.p + mn.x) * params.n;
    let offset_b = (ij.y * params.p + mn.y) * params.n;

    // Zero phase (spec.md §4.2 step 1): barrier after contingency zeroing.
    var zi = tid;
    loop {{
        if (zi >= {kk}u) {{ break; }}
        atomicStore(&contingency[zi], 0u);
        zi = zi + {WORKGROUP_SIZE}u;
    }}
    workgroupBarrier();

    // Accumulation phase (spec.md §4.2 step 2): barrier after contingency
    // accumulation.
{accumulate}
    workgroupBarrier();

    // Marginals (spec.md §4.3 step 1): zero then accumulate, each its own
    // barrier — the zero must complete before any atomicAdd targets the
    // same cell, which spec.md's single listed barrier after accumulation
    // does not by itself guarantee across a 256-lane workgroup.
    if (tid < params.k) {{
        atomicStore(&row_sum[tid], 0u);
        atomicStore(&col_sum[tid], 0u);
    }}
    workgroupBarrier();

    var mi = tid;
    loop {{
        if (mi >= {kk}u) {{ break; }}
        let row_idx = mi / params.k;
        let col_idx = mi % params.k;
        let c = atomicLoad(&contingency[mi]);
        if (c > 0u) {{
            atomicAdd(&row_sum[row_idx], c);
            atomicAdd(&col_sum[col_idx], c);
        }}
        mi = mi + {WORKGROUP_SIZE}u;
    }}
    workgroupBarrier();

    // Pair-confusion reduction and ARI finalizer (spec.md §4.3 steps 2-3,
    // §4.4), done by a single designated thread in 64-bit integer
    // arithmetic (spec.md §9(b)/(d)).
    //
    // spec.md §4.3 writes FP/FN as O(K^2) double sums over C with
    // transposed indexing: FP = sum_{a,b} C[a,b]*col[b] - SS, FN =
    // sum_{a,b} C[b,a]*row[b] - SS. Both collapse algebraically to O(K)
    // sums of marginal squares (sum_a C[a,b] = col[b], sum_b C[a,b] =
    // row[a]), which is what this thread computes: FP = sum(col^2) - SS,
    // FN = sum(row^2) - SS. Same values, cheaper for the one thread that
    // pays for them.
    if (tid == 0u) {{
        var ss: i64 = i64(0);
        var idx = 0u;
        loop {{
            if (idx >= {kk}u) {{ break; }}
            let c = i64(atomicLoad(&contingency[idx]));
            ss = ss + c * c;
            idx = idx + 1u;
        }}

        var sum_row_sq: i64 = i64(0);
        var sum_col_sq: i64 = i64(0);
        var ki = 0u;
        loop {{
            if (ki >= params.k) {{ break; }}
            let r = i64(atomicLoad(&row_sum[ki]));
            let cc = i64(atomicLoad(&col_sum[ki]));
            sum_row_sq = sum_row_sq + r * r;
            sum_col_sq = sum_col_sq + cc * cc;
            ki = ki + 1u;
        }}

        let n64 = i64(params.n);
        let tp = ss - n64;
        let fp = sum_col_sq - ss;
        let fn_count = sum_row_sq - ss;
        let tn = n64 * n64 - fp - fn_count - ss;

        var ari: f32;
        if (fn_count == i64(0) && fp == i64(0)) {{
            ari = 1.0;
        }} else {{
            let numerator = i64(2) * (tp * tn - fn_count * fp);
            let denominator = (tp + fn_count) * (fn_count + tn) + (tp + fp) * (fp + tn);
            ari = f32(numerator) / f32(denominator);
        }}

        out[b] = ari;
    }}
}}
"
    )
}

fn direct_accumulate_body() -> String {
    format!(
        r"
    var i = tid;
    loop {{
        if (i >= params.n) {{ break; }}
        let a = parts[offset_a + i];
        let b_label = parts[offset_b + i];
        if (a >= 0 && b_label >= 0 && u32(a) < params.k && u32(b_label) < params.k) {{
            atomicAdd(&contingency[u32(a) * params.k + u32(b_label)], 1u);
        }}
        i = i + {WORKGROUP_SIZE}u;
    }}
"
    )
}

fn tiled_accumulate_body() -> String {
    format!(
        r"
    var tile_start = 0u;
    loop {{
        if (tile_start >= params.n) {{ break; }}
        let tile_len = min({TILE_SIZE}u, params.n - tile_start);

        // Striped cooperative load into workgroup staging (spec.md §4.2
        // tiled variant): amortizes global-memory latency ahead of the
        // atomic accumulation below.
        var li = tid;
        loop {{
            if (li >= tile_len) {{ break; }}
            staged_a[li] = parts[offset_a + tile_start + li];
            staged_b[li] = parts[offset_b + tile_start + li];
            li = li + {WORKGROUP_SIZE}u;
        }}
        workgroupBarrier();

        // Accumulate from the staged values, not the raw global index —
        // spec.md §9(a) flags the opposite as a bug that makes the staged
        // load dead code in the source this was modeled on.
        var ai = tid;
        loop {{
            if (ai >= tile_len) {{ break; }}
            let a = staged_a[ai];
            let b_label = staged_b[ai];
            if (a >= 0 && b_label >= 0 && u32(a) < params.k && u32(b_label) < params.k) {{
                atomicAdd(&contingency[u32(a) * params.k + u32(b_label)], 1u);
            }}
            ai = ai + {WORKGROUP_SIZE}u;
        }}
        workgroupBarrier();

        tile_start = tile_start + {TILE_SIZE}u;
    }}
"
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::kernel::reduction::label_extent;
    use crate::Context;

    fn run(ctx: &Context, parts: &[i32], f: u32, p: u32, n: u32) -> Vec<f32> {
        let buffer = ctx.create_buffer_from_slice(parts).unwrap();
        let extent = label_extent::reduce(ctx, &buffer, parts.len()).unwrap();
        assert!(!extent.any_negative);
        let out = score_all(ctx, &buffer, f, p, n, extent.k).unwrap();
        ctx.read_buffer(&out).unwrap()
    }

    #[test]
    fn test_identical_partitions_score_one() {
        let ctx = Context::try_default().unwrap();
        let parts = [0, 0, 1, 1, 0, 0, 1, 1];
        let out = run(&ctx, &parts, 2, 1, 4);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_relabeling_invariance() {
        let ctx = Context::try_default().unwrap();
        let parts = [0, 0, 1, 1, 1, 1, 0, 0];
        let out = run(&ctx, &parts, 2, 1, 4);
        assert_relative_eq!(out[0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_complete_disagreement() {
        let ctx = Context::try_default().unwrap();
        let parts = [0, 0, 1, 1, 0, 1, 0, 1];
        let out = run(&ctx, &parts, 2, 1, 4);
        assert_relative_eq!(out[0], -0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_single_object() {
        let ctx = Context::try_default().unwrap();
        let parts = [0, 0];
        let out = run(&ctx, &parts, 2, 1, 1);
        assert_relative_eq!(out[0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_single_feature_no_pairs() {
        let ctx = Context::try_default().unwrap();
        let parts = [0, 0, 1, 1];
        let out = run(&ctx, &parts, 1, 1, 4);
        assert!(out.is_empty());
    }

    #[test]
    fn test_multiple_partition_variants_ordering() {
        let ctx = Context::try_default().unwrap();
        // f=3, p=2, all six variants equal to [0,0,1,1] -> 12 scores, all 1.0.
        let variant = [0, 0, 1, 1];
        let mut parts = Vec::new();
        for _ in 0..6 {
            parts.extend_from_slice(&variant);
        }
        let out = run(&ctx, &parts, 3, 2, 4);
        assert_eq!(out.len(), 12);
        for score in out {
            assert_relative_eq!(score, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_tiled_variant_matches_direct_for_large_n() {
        let ctx = Context::try_default().unwrap();
        let n = 5000usize;
        let mut a = vec![0i32; n];
        let mut b = vec![0i32; n];
        for t in 0..n {
            a[t] = (t % 3) as i32;
            b[t] = (t % 3) as i32;
        }
        let mut parts = a.clone();
        parts.extend_from_slice(&b);
        let out = run(&ctx, &parts, 2, 1, n as u32);
        assert_relative_eq!(out[0], 1.0, epsilon = 1e-4);
    }
}
