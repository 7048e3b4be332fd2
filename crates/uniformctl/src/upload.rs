use anyhow::{Context, Result};
use instance_uniforms::{StorageAllocator, TextureAllocator, UniformStorage, UniformValue};

use crate::cli::UploadArgs;
use crate::report::compile_manifest;

pub fn run_upload(args: UploadArgs) -> Result<()> {
    let compiled = compile_manifest(&args.schema, args.capacity)?;

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: None,
        force_fallback_adapter: args.fallback_adapter,
    }))
    .context("failed to find a suitable GPU adapter")?;
    let info = adapter.get_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "using adapter");

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("uniformctl upload device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")?;

    let mut storage = TextureAllocator::new(device)
        .allocate(compiled.descriptor())
        .context("failed to allocate uniform texture")?;
    for (name, entry) in compiled.layout.uniforms().iter() {
        storage
            .encode(0, entry, &UniformValue::zeroed(entry.ty))
            .with_context(|| format!("failed to encode uniform '{name}'"))?;
    }
    storage.mark_dirty(0);
    let rows = storage.flush(&queue);

    let side = storage.texels().side();
    println!(
        "allocated {side}x{side} {:?} texture for {} instances; uploaded {rows} row(s)",
        storage.format(),
        compiled.capacity
    );
    Ok(())
}
