// Launch helpers and the device-side elementwise kernels.
// The public entry points are the methods on `GpuDevice`.

use crate::context::{Binding, CachedKernel, GpuContext};
use crate::error::{check_sizes, Result};
use crate::field::operators::{WgslBinary, WgslUnary};
use crate::gpu_field::{GpuField, GpuLabels};
use crate::shader_gen::{self, Shape};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;

/// Must match `@workgroup_size` in every kernel.
pub(crate) const WORKGROUP_SIZE: u32 = 64;

/// Uniform block shared by all kernels. Field meaning is per kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct KernelParams {
    pub(crate) n: u32,
    pub(crate) aux: u32,
    pub(crate) flags: u32,
    pub(crate) value: f32,
}

impl KernelParams {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            n: n as u32,
            aux: 0,
            flags: 0,
            value: 0.0,
        }
    }
}

/// Workgroup grid covering `n` items. Spills into y once x hits the device limit;
/// kernels flatten with `gid.x + gid.y * nwg.x * WORKGROUP_SIZE`.
pub(crate) fn dispatch_size(n: usize, max_per_dimension: u32) -> (u32, u32) {
    let groups = (n as u64).div_ceil(WORKGROUP_SIZE as u64).max(1);
    let max = max_per_dimension.max(1) as u64;
    if groups <= max {
        (groups as u32, 1)
    } else {
        (max as u32, groups.div_ceil(max) as u32)
    }
}

/// Binds `params` plus `buffers` (in binding order) and submits one dispatch over `n` items.
pub(crate) fn launch(
    context: &GpuContext,
    kernel: &CachedKernel,
    label: &str,
    params: KernelParams,
    buffers: &[&wgpu::Buffer],
    n: usize,
) {
    if n == 0 {
        log::debug!("Skipping '{}' for 0 items", label);
        return;
    }
    let params_buffer = context.create_gpu_buffer_with_data(
        label,
        bytemuck::bytes_of(&params),
        wgpu::BufferUsages::UNIFORM,
    );

    let mut entries = Vec::with_capacity(buffers.len() + 1);
    entries.push(wgpu::BindGroupEntry {
        binding: 0,
        resource: params_buffer.as_entire_binding(),
    });
    for (i, buffer) in buffers.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: buffer.as_entire_binding(),
        });
    }
    let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &kernel.layout,
        entries: &entries,
    });

    let (x, y) = dispatch_size(n, context.capabilities.max_workgroups_per_dimension);
    log::debug!("Dispatching '{}' over {} items ({} x {} workgroups)", label, n, x, y);

    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&kernel.pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.dispatch_workgroups(x, y, 1);
    }
    context.queue.submit(Some(encoder.finish()));
}

/// Binding list for a kernel with a uniform block, `inputs` read-only buffers and one output.
pub(crate) fn bindings(inputs: usize, output: Binding) -> Vec<Binding> {
    let mut b = vec![Binding::Uniform];
    b.extend(std::iter::repeat(Binding::READ).take(inputs));
    b.push(output);
    b
}

fn elementwise_kernel(
    context: &GpuContext,
    key: String,
    shape: Shape,
    source: impl FnOnce() -> String,
) -> Result<std::sync::Arc<CachedKernel>> {
    context.kernel(&key, &bindings(shape.inputs(), Binding::WRITE), || {
        Cow::Owned(source())
    })
}

pub(crate) fn internal_field_field<Op: WgslBinary>(
    context: &GpuContext,
    a: &GpuField,
    b: &GpuField,
    out: &mut GpuField,
) -> Result<()> {
    check_sizes(Op::NAME, a.len(), b.len())?;
    check_sizes(Op::NAME, out.len(), a.len())?;
    let key = format!("{}_{}", Op::NAME, Shape::FieldField.name());
    let kernel = elementwise_kernel(context, key.clone(), Shape::FieldField, || {
        shader_gen::binary_kernel::<Op>(Shape::FieldField)
    })?;
    launch(
        context,
        &kernel,
        &key,
        KernelParams::new(a.len()),
        &[a.inner(), b.inner(), out.inner()],
        a.len(),
    );
    Ok(())
}

pub(crate) fn internal_broadcast<Op: WgslBinary>(
    context: &GpuContext,
    shape: Shape,
    field: &GpuField,
    value: f32,
    out: &mut GpuField,
) -> Result<()> {
    check_sizes(Op::NAME, out.len(), field.len())?;
    let key = format!("{}_{}", Op::NAME, shape.name());
    let kernel = elementwise_kernel(context, key.clone(), shape, || {
        shader_gen::binary_kernel::<Op>(shape)
    })?;
    let params = KernelParams {
        value,
        ..KernelParams::new(field.len())
    };
    launch(
        context,
        &kernel,
        &key,
        params,
        &[field.inner(), out.inner()],
        field.len(),
    );
    Ok(())
}

pub(crate) fn internal_unary<F: WgslUnary>(
    context: &GpuContext,
    a: &GpuField,
    out: &mut GpuField,
) -> Result<()> {
    check_sizes(F::NAME, out.len(), a.len())?;
    let key = format!("{}_{}", F::NAME, Shape::Unary.name());
    let kernel = elementwise_kernel(context, key.clone(), Shape::Unary, shader_gen::unary_kernel::<F>)?;
    launch(
        context,
        &kernel,
        &key,
        KernelParams::new(a.len()),
        &[a.inner(), out.inner()],
        a.len(),
    );
    Ok(())
}

const INDIRECT_ASSIGN_SHADER: &str = include_str!("shaders/indirect_assign.wgsl");
const INDIRECT_FILL_SHADER: &str = include_str!("shaders/indirect_fill.wgsl");

pub(crate) fn internal_indirect_assign(
    context: &GpuContext,
    target: &mut GpuField,
    addr: &GpuLabels,
    source: &GpuField,
) -> Result<()> {
    check_sizes("indirect assign", addr.len(), source.len())?;
    addr.check_bound(target.len())?;
    if !addr.is_unique() {
        log::warn!("indirect assign through a list with duplicates; repeated slots get an unspecified value");
    }
    let kernel = context.kernel("indirect_assign", &bindings(2, Binding::WRITE), || {
        Cow::Borrowed(INDIRECT_ASSIGN_SHADER)
    })?;
    launch(
        context,
        &kernel,
        "indirect_assign",
        KernelParams::new(addr.len()),
        &[addr.inner(), source.inner(), target.inner()],
        addr.len(),
    );
    Ok(())
}

pub(crate) fn internal_indirect_fill(
    context: &GpuContext,
    target: &mut GpuField,
    addr: &GpuLabels,
    value: f32,
) -> Result<()> {
    addr.check_bound(target.len())?;
    let kernel = context.kernel("indirect_fill", &bindings(1, Binding::WRITE), || {
        Cow::Borrowed(INDIRECT_FILL_SHADER)
    })?;
    let params = KernelParams {
        value,
        ..KernelParams::new(addr.len())
    };
    launch(
        context,
        &kernel,
        "indirect_fill",
        params,
        &[addr.inner(), target.inner()],
        addr.len(),
    );
    Ok(())
}
