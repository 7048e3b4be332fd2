use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use instance_uniforms::StorageDescriptor;
use serde::Serialize;
use uniform_layout::{SchemaManifest, UniformLayout};

use crate::cli::LayoutArgs;

/// A compiled manifest plus the capacity it should be allocated for.
pub(crate) struct Compiled {
    pub layout: Arc<UniformLayout>,
    pub capacity: usize,
}

impl Compiled {
    pub fn descriptor(&self) -> StorageDescriptor {
        StorageDescriptor::new(Arc::clone(&self.layout), self.capacity)
    }
}

pub(crate) fn compile_manifest(path: &Path, capacity: Option<usize>) -> Result<Compiled> {
    let manifest = SchemaManifest::from_path(path)?;
    let layout = manifest
        .layout()
        .with_context(|| format!("failed to compile schema {}", path.display()))?;
    let capacity = capacity.or(manifest.capacity).unwrap_or(1);
    if capacity == 0 {
        anyhow::bail!("capacity must be greater than zero");
    }
    Ok(Compiled {
        layout: Arc::new(layout),
        capacity,
    })
}

#[derive(Serialize)]
struct LayoutReport<'a> {
    capacity: usize,
    texture_side: usize,
    layout: &'a UniformLayout,
}

pub fn run_layout(args: LayoutArgs) -> Result<()> {
    let compiled = compile_manifest(&args.schema, args.capacity)?;
    let side = compiled
        .descriptor()
        .side()
        .context("failed to size uniform storage")?;

    if args.json {
        let report = LayoutReport {
            capacity: compiled.capacity,
            texture_side: side,
            layout: &compiled.layout,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print!("{}", render_table(&compiled.layout, compiled.capacity, side));
    Ok(())
}

fn render_table(layout: &UniformLayout, capacity: usize, side: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("channels:            {}\n", layout.channels()));
    out.push_str(&format!(
        "pixels per instance: {}\n",
        layout.pixels_per_instance()
    ));
    if layout.texels_spanned() > layout.pixels_per_instance() {
        out.push_str(&format!(
            "texels spanned:      {}\n",
            layout.texels_spanned()
        ));
    }
    out.push_str(&format!("total slots:         {}\n", layout.total_slots()));
    out.push_str(&format!("capacity:            {capacity} ({side}x{side} texels)\n"));

    let width = layout
        .uniforms()
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max("uniform".len());
    out.push_str(&format!(
        "\n{:<width$}  {:<5}  {:>6}  {:>5}  {:>7}  {:>4}\n",
        "uniform", "type", "offset", "texel", "channel", "size"
    ));
    for (name, entry) in layout.uniforms().by_offset() {
        out.push_str(&format!(
            "{:<width$}  {:<5}  {:>6}  {:>5}  {:>7}  {:>4}\n",
            name,
            entry.ty.as_str(),
            entry.offset,
            entry.texel(),
            entry.channel(),
            entry.size
        ));
    }
    out
}
