use uniform_layout::UniformEntry;

use super::{StorageAllocator, StorageDescriptor, TexelBuffer, UniformStorage};
use crate::{UniformError, UniformValue};

/// Allocates [`TextureStorage`] on a `wgpu` device.
#[derive(Debug, Clone)]
pub struct TextureAllocator {
    device: wgpu::Device,
}

impl TextureAllocator {
    pub fn new(device: wgpu::Device) -> Self {
        Self { device }
    }
}

impl StorageAllocator for TextureAllocator {
    type Storage = TextureStorage;

    fn allocate(&self, descriptor: StorageDescriptor) -> Result<TextureStorage, UniformError> {
        TextureStorage::new(&self.device, descriptor)
    }
}

/// Uniform storage mirrored into a square float texture.
///
/// Writes land in the CPU mirror; [`TextureStorage::flush`] uploads the grid
/// rows touched by dirty instances.
#[derive(Debug)]
pub struct TextureStorage {
    device: wgpu::Device,
    texels: TexelBuffer,
    format: wgpu::TextureFormat,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Texture format and floats per texel for a layout's channel count.
fn texel_format(channels: usize) -> (wgpu::TextureFormat, usize) {
    match channels {
        1 => (wgpu::TextureFormat::R32Float, 1),
        2 => (wgpu::TextureFormat::Rg32Float, 2),
        // No three-channel float format exists; pad to RGBA.
        _ => (wgpu::TextureFormat::Rgba32Float, 4),
    }
}

impl TextureStorage {
    pub fn new(device: &wgpu::Device, descriptor: StorageDescriptor) -> Result<Self, UniformError> {
        let (format, stride) = texel_format(descriptor.channels.get());
        // Reject grids the device cannot hold before sizing the CPU mirror.
        checked_side(&descriptor, device.limits().max_texture_dimension_2d)?;
        let texels = TexelBuffer::new(descriptor, stride)?;
        let (texture, view) = create_texture(device, format, texels.side());
        Ok(Self {
            device: device.clone(),
            texels,
            format,
            texture,
            view,
        })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn texels(&self) -> &TexelBuffer {
        &self.texels
    }

    /// Uploads every grid row touched by a dirty instance and clears the dirty
    /// set. Returns the number of rows written.
    pub fn flush(&mut self, queue: &wgpu::Queue) -> usize {
        let dirty = self.texels.take_dirty();
        let side = self.texels.side();
        let runs = self.texels.row_runs(&dirty);

        let bytes_per_row = (side * self.texels.stride() * std::mem::size_of::<f32>()) as u32;
        let mut rows_written = 0;
        for rows in runs {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: rows.start as u32,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                self.texels.row_bytes(rows.clone()),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(rows.len() as u32),
                },
                wgpu::Extent3d {
                    width: side as u32,
                    height: rows.len() as u32,
                    depth_or_array_layers: 1,
                },
            );
            rows_written += rows.len();
        }

        if rows_written > 0 {
            tracing::debug!(
                instances = dirty.len(),
                rows = rows_written,
                "uploaded per-instance uniform rows"
            );
        }
        rows_written
    }
}

/// Grid side for `descriptor`, or an allocation error when it exceeds the
/// device's 2D texture limit.
fn checked_side(descriptor: &StorageDescriptor, max: u32) -> Result<usize, UniformError> {
    let side = descriptor.side()?;
    if side > max as usize {
        return Err(UniformError::Allocation(format!(
            "uniform texture side {side} exceeds device limit {max}"
        )));
    }
    Ok(side)
}

fn create_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    side: usize,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("per-instance uniforms"),
        size: wgpu::Extent3d {
            width: side as u32,
            height: side as u32,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    tracing::debug!(side, format = ?format, "allocated uniform texture");
    (texture, view)
}

impl UniformStorage for TextureStorage {
    fn descriptor(&self) -> &StorageDescriptor {
        self.texels.descriptor()
    }

    fn encode(
        &mut self,
        id: usize,
        entry: &UniformEntry,
        value: &UniformValue,
    ) -> Result<(), UniformError> {
        self.texels.write(id, entry, value)
    }

    fn decode(
        &self,
        id: usize,
        entry: &UniformEntry,
        target: &mut UniformValue,
    ) -> Result<(), UniformError> {
        self.texels.read(id, entry, target)
    }

    fn mark_dirty(&mut self, id: usize) {
        self.texels.mark_dirty(id);
    }

    fn dirty_instances(&self) -> Vec<usize> {
        self.texels.dirty().iter().copied().collect()
    }

    fn resize(&mut self, capacity: usize) -> Result<(), UniformError> {
        checked_side(
            &self.texels.descriptor().with_capacity(capacity),
            self.device.limits().max_texture_dimension_2d,
        )?;
        let kept = capacity.min(self.texels.descriptor().capacity);
        self.texels.resize(capacity)?;

        let (texture, view) = create_texture(&self.device, self.format, self.texels.side());
        self.texture = texture;
        self.view = view;
        // A fresh texture holds none of the copied values yet.
        self.texels.mark_range_dirty(0..kept);
        Ok(())
    }
}
