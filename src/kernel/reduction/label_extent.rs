//! Derives the alphabet bound `K` and detects negative labels by a chained
//! parallel reduction over the flattened partition tensor.
//!
//! Grounded on the teacher's `kernel::reduction::sum` chained tree-reduction
//! kernel: a first pass reads the input in `vec4<i32>` groups and reduces
//! each workgroup to one partial `(max, any_negative)` pair; if more than
//! one workgroup ran, a "combine" pass repeats the same tree reduction over
//! the partial buffers until a single pair remains. Splitting a dispatch
//! that would otherwise exceed the device's per-dimension workgroup limit
//! into a 2D grid follows the teacher's `kernel::activation::relu` pattern.
//! Padding lanes beyond the true element count contribute `i32::MIN` to the
//! max reduction and `0` to the any-negative OR-reduction, so they never
//! perturb the real result.

use crate::device::{Buffer, Context};
use crate::kernel::split_dispatch;
use crate::Error;

const WORKGROUP_SIZE: u32 = 256;
const ITEMS_PER_THREAD: u32 = 4;

/// Result of a label-extent reduction: the inferred alphabet bound and
/// whether any negative label was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LabelExtent {
    /// `max(labels) + 1`, the alphabet bound `K`.
    pub(crate) k: u32,
    /// `true` if any label in the tensor was negative.
    pub(crate) any_negative: bool,
}

/// Runs the chained max/any-negative reduction over `buffer` (logically
/// `len` valid `i32` labels; the buffer may be padded beyond that).
///
/// # Errors
///
/// Returns [`Error::Device`] if shader compilation, dispatch, or readback
/// fails.
pub(crate) fn reduce(
    ctx: &Context,
    buffer: &Buffer<i32>,
    len: usize,
) -> Result<LabelExtent, Error> {
    debug_assert!(len > 0, "caller must validate non-empty tensor first");

    let max_dim = ctx.max_workgroups_per_dimension();

    let vec4_count = u32::try_from(len.div_ceil(4))
        .map_err(|_| Error::Device("label tensor too large for a single reduction pass".into()))?;

    let initial_workgroups_needed = vec4_count.div_ceil(WORKGROUP_SIZE);
    let (total, wg_x, wg_y) = split_dispatch(initial_workgroups_needed, max_dim);

    let mut out_max = ctx.create_buffer::<i32>(total as usize)?;
    let mut out_neg = ctx.create_buffer::<u32>(total as usize)?;

    run_initial_pass(ctx, buffer, &out_max, &out_neg, vec4_count, wg_x, wg_y)?;

    let mut remaining = total;
    while remaining > 1 {
        let combine_workgroups_needed = remaining.div_ceil(WORKGROUP_SIZE * ITEMS_PER_THREAD);
        let (next_total, next_wg_x, next_wg_y) = split_dispatch(combine_workgroups_needed, max_dim);

        let next_max = ctx.create_buffer::<i32>(next_total as usize)?;
        let next_neg = ctx.create_buffer::<u32>(next_total as usize)?;

        run_combine_pass(
            ctx, &out_max, &out_neg, &next_max, &next_neg, remaining, next_wg_x, next_wg_y,
        )?;

        ctx.release_buffer(out_max.into_inner());
        ctx.release_buffer(out_neg.into_inner());
        out_max = next_max;
        out_neg = next_neg;
        remaining = next_total;
    }

    ctx.sync()?;

    let max_label = ctx.read_buffer(&out_max)?[0];
    let any_negative = ctx.read_buffer(&out_neg)?[0] != 0;
    ctx.release_buffer(out_max.into_inner());
    ctx.release_buffer(out_neg.into_inner());

    let k = u32::try_from(max_label + 1)
        .map_err(|_| Error::Device("alphabet bound computation underflowed".into()))?;

    Ok(LabelExtent { k, any_negative })
}

fn run_initial_pass(
    ctx: &Context,
    input: &Buffer<i32>,
    out_max: &Buffer<i32>,
    out_neg: &Buffer<u32>,
    vec4_count: u32,
    wg_x: u32,
    wg_y: u32,
) -> Result<(), Error> {
    let pipeline = ctx.get_or_create_pipeline("reduction::label_extent::initial", |device| {
        let source = initial_shader_source();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("label_extent_initial"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("label_extent_initial"),
            layout: None,
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        })
    });

    let params = ctx.create_uniform_buffer(&vec4_count);
    let bind_group_layout = pipeline.get_bind_group_layout(0);
    let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: input.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: out_max.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: out_neg.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: params.as_entire_binding(),
            },
        ],
    });

    dispatch(ctx, &pipeline, &bind_group, wg_x, wg_y)
}

fn run_combine_pass(
    ctx: &Context,
    in_max: &Buffer<i32>,
    in_neg: &Buffer<u32>,
    out_max: &Buffer<i32>,
    out_neg: &Buffer<u32>,
    count: u32,
    wg_x: u32,
    wg_y: u32,
) -> Result<(), Error> {
    let pipeline = ctx.get_or_create_pipeline("reduction::label_extent::combine", |device| {
        let source = combine_shader_source();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("label_extent_combine"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("label_extent_combine"),
            layout: None,
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        })
    });

    let params = ctx.create_uniform_buffer(&count);
    let bind_group_layout = pipeline.get_bind_group_layout(0);
    let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: in_max.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: in_neg.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: out_max.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: out_neg.inner().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: params.as_entire_binding(),
            },
        ],
    });

    dispatch(ctx, &pipeline, &bind_group, wg_x, wg_y)
}

fn dispatch(
    ctx: &Context,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    workgroups_x: u32,
    workgroups_y: u32,
) -> Result<(), Error> {
    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
    }
    ctx.queue().submit(Some(encoder.finish()));
    Ok(())
}

fn initial_shader_source() -> String {
    format!(
        r"
struct Params {{
    vec4_count: u32,
}}

@group(0) @binding(0) var<storage, read> input: array<vec4<i32>>;
@group(0) @binding(1) var<storage, read_write> out_max: array<i32>;
@group(0) @binding(2) var<storage, read_write> out_neg: array<u32>;
@group(0) @binding(3) var<uniform> params: Params;

var<workgroup> smax: array<i32, {wg}>;
var<workgroup> sneg: array<u32, {wg}>;

@compute @workgroup_size({wg})
fn main(
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) num_wg: vec3<u32>,
) {{
    let tid = lid.x;
    let idx = wid.x + wid.y * num_wg.x;

    var local_max = -2147483648;
    var local_neg = 0u;
    if (idx < params.vec4_count) {{
        let v = input[idx];
        local_max = max(max(v.x, v.y), max(v.z, v.w));
        if (v.x < 0 || v.y < 0 || v.z < 0 || v.w < 0) {{
            local_neg = 1u;
        }}
    }}
    smax[tid] = local_max;
    sneg[tid] = local_neg;
    workgroupBarrier();

    {tree_reduce}

    if (tid == 0u) {{
        out_max[idx] = smax[0];
        out_neg[idx] = sneg[0];
    }}
}}
",
        wg = WORKGROUP_SIZE,
        tree_reduce = tree_reduce_body(WORKGROUP_SIZE),
    )
}

fn combine_shader_source() -> String {
    format!(
        r"
struct Params {{
    count: u32,
}}

@group(0) @binding(0) var<storage, read> in_max: array<i32>;
@group(0) @binding(1) var<storage, read> in_neg: array<u32>;
@group(0) @binding(2) var<storage, read_write> out_max: array<i32>;
@group(0) @binding(3) var<storage, read_write> out_neg: array<u32>;
@group(0) @binding(4) var<uniform> params: Params;

var<workgroup> smax: array<i32, {wg}>;
var<workgroup> sneg: array<u32, {wg}>;

@compute @workgroup_size({wg})
fn main(
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) num_wg: vec3<u32>,
) {{
    let tid = lid.x;
    let group_idx = wid.x + wid.y * num_wg.x;
    let base = group_idx * {wg}u * {ipt}u + tid * {ipt}u;

    var local_max = -2147483648;
    var local_neg = 0u;
    for (var k = 0u; k < {ipt}u; k = k + 1u) {{
        let i = base + k;
        if (i < params.count) {{
            local_max = max(local_max, in_max[i]);
            local_neg = local_neg | in_neg[i];
        }}
    }}
    smax[tid] = local_max;
    sneg[tid] = local_neg;
    workgroupBarrier();

    {tree_reduce}

    if (tid == 0u) {{
        out_max[group_idx] = smax[0];
        out_neg[group_idx] = sneg[0];
    }}
}}
",
        wg = WORKGROUP_SIZE,
        ipt = ITEMS_PER_THREAD,
        tree_reduce = tree_reduce_body(WORKGROUP_SIZE),
    )
}

/// Emits an unrolled, barrier-separated tree reduction over `smax`/`sneg`
/// from `size` active lanes down to one, in the style of the teacher's
/// `kernel::reduction::sum` kernel.
fn tree_reduce_body(size: u32) -> String {
    let mut body = String::new();
    let mut stride = size / 2;
    while stride >= 1 {
        body.push_str(&format!(
            "    if (tid < {stride}u) {{ smax[tid] = max(smax[tid], smax[tid + {stride}u]); sneg[tid] = sneg[tid] | sneg[tid + {stride}u]; }}\n    workgroupBarrier();\n",
        ));
        stride /= 2;
    }
    body
}
