//! Backing storage for compiled uniform layouts.
//!
//! - `TexelBuffer` is the CPU-side square texel grid shared by every backend.
//!   Instance `id` owns the texels starting at `id * pixels_per_instance`,
//!   walking the grid row-major.
//! - `memory` keeps nothing but that grid and is what tests drive.
//! - `texture` mirrors the grid into a `wgpu` float texture and uploads the rows
//!   touched by dirty instances when the host flushes.

mod memory;
mod texture;

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use uniform_layout::{ChannelCount, UniformEntry, UniformLayout, TEXEL_SLOTS};

use crate::{UniformError, UniformValue};

pub use memory::{MemoryAllocator, MemoryStorage};
pub use texture::{TextureAllocator, TextureStorage};

/// Sizing handed to a [`StorageAllocator`]. Elements are always `f32`.
#[derive(Debug, Clone)]
pub struct StorageDescriptor {
    pub channels: ChannelCount,
    pub pixels_per_instance: usize,
    pub capacity: usize,
    pub layout: Arc<UniformLayout>,
}

impl StorageDescriptor {
    pub fn new(layout: Arc<UniformLayout>, capacity: usize) -> Self {
        Self {
            channels: layout.channels(),
            pixels_per_instance: layout.row_texels(),
            capacity,
            layout,
        }
    }

    pub fn with_capacity(&self, capacity: usize) -> Self {
        Self {
            capacity,
            ..self.clone()
        }
    }

    /// Texels needed for every instance, or an allocation error when the
    /// product does not fit in `usize`.
    pub fn texel_count(&self) -> Result<usize, UniformError> {
        self.capacity
            .checked_mul(self.pixels_per_instance)
            .ok_or_else(|| {
                UniformError::Allocation(format!(
                    "{} instances of {} texels overflow the texel grid",
                    self.capacity, self.pixels_per_instance
                ))
            })
    }

    /// Edge length of the smallest square grid holding every texel.
    pub fn side(&self) -> Result<usize, UniformError> {
        let count = self.texel_count()?.max(1);
        // An area that overflows is larger than any representable count.
        let covers = |side: usize| side.checked_mul(side).map_or(true, |area| area >= count);
        let mut side = (count as f64).sqrt().ceil() as usize;
        while !covers(side) {
            side += 1;
        }
        while side > 1 && covers(side - 1) {
            side -= 1;
        }
        Ok(side)
    }
}

/// Per-instance encode/decode plus dirty tracking over a compiled layout.
pub trait UniformStorage {
    fn descriptor(&self) -> &StorageDescriptor;

    /// Writes `value` at `entry` for instance `id`. Nothing is written on error.
    fn encode(
        &mut self,
        id: usize,
        entry: &UniformEntry,
        value: &UniformValue,
    ) -> Result<(), UniformError>;

    /// Reads the value at `entry` for instance `id` into `target`, whose shape
    /// must match the entry's type.
    fn decode(
        &self,
        id: usize,
        entry: &UniformEntry,
        target: &mut UniformValue,
    ) -> Result<(), UniformError>;

    /// Flags instance `id` for the next upload.
    fn mark_dirty(&mut self, id: usize);

    /// Instances waiting for upload, ascending.
    fn dirty_instances(&self) -> Vec<usize>;

    /// Reallocates for `capacity` instances, keeping the values of instances
    /// that still fit.
    fn resize(&mut self, capacity: usize) -> Result<(), UniformError>;
}

/// Creates storage for a freshly compiled layout.
pub trait StorageAllocator {
    type Storage: UniformStorage;

    fn allocate(&self, descriptor: StorageDescriptor) -> Result<Self::Storage, UniformError>;
}

/// Square grid of float texels with dirty-instance tracking.
#[derive(Debug, Clone)]
pub struct TexelBuffer {
    descriptor: StorageDescriptor,
    stride: usize,
    side: usize,
    data: Vec<f32>,
    dirty: BTreeSet<usize>,
}

impl TexelBuffer {
    /// `stride` is the number of floats per texel in `data`; it may exceed the
    /// layout's channel count when the target format is wider.
    pub fn new(descriptor: StorageDescriptor, stride: usize) -> Result<Self, UniformError> {
        let stride = stride.max(descriptor.channels.get());
        let side = descriptor.side()?;
        let len = side
            .checked_mul(side)
            .and_then(|area| area.checked_mul(stride))
            .ok_or_else(|| {
                UniformError::Allocation(format!(
                    "texel grid of side {side} with {stride} floats per texel overflows"
                ))
            })?;

        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|err| {
            UniformError::Allocation(format!("cannot reserve {len} uniform floats: {err}"))
        })?;
        data.resize(len, 0.0);

        Ok(Self {
            data,
            descriptor,
            stride,
            side,
            dirty: BTreeSet::new(),
        })
    }

    pub fn descriptor(&self) -> &StorageDescriptor {
        &self.descriptor
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn check_instance(&self, id: usize) -> Result<(), UniformError> {
        if id < self.descriptor.capacity {
            Ok(())
        } else {
            Err(UniformError::InstanceOutOfRange {
                id,
                capacity: self.descriptor.capacity,
            })
        }
    }

    /// Index into `data` of scalar slot `slot` of instance `id`.
    fn slot_index(&self, id: usize, slot: usize) -> usize {
        let texel = id * self.descriptor.pixels_per_instance + slot / TEXEL_SLOTS;
        texel * self.stride + slot % TEXEL_SLOTS
    }

    pub fn write(
        &mut self,
        id: usize,
        entry: &UniformEntry,
        value: &UniformValue,
    ) -> Result<(), UniformError> {
        self.check_instance(id)?;
        value.expect_type(entry.ty)?;
        for (index, component) in value.components().iter().enumerate() {
            let at = self.slot_index(id, entry.offset + index);
            self.data[at] = *component;
        }
        Ok(())
    }

    pub fn read(
        &self,
        id: usize,
        entry: &UniformEntry,
        target: &mut UniformValue,
    ) -> Result<(), UniformError> {
        self.check_instance(id)?;
        target.expect_type(entry.ty)?;
        for (index, component) in target.components_mut().iter_mut().enumerate() {
            *component = self.data[self.slot_index(id, entry.offset + index)];
        }
        Ok(())
    }

    pub fn mark_dirty(&mut self, id: usize) {
        if id < self.descriptor.capacity {
            self.dirty.insert(id);
        }
    }

    /// Flags every in-range instance of `ids`.
    pub fn mark_range_dirty(&mut self, ids: Range<usize>) {
        let end = ids.end.min(self.descriptor.capacity);
        self.dirty.extend(ids.start..end);
    }

    pub fn dirty(&self) -> &BTreeSet<usize> {
        &self.dirty
    }

    pub fn take_dirty(&mut self) -> BTreeSet<usize> {
        std::mem::take(&mut self.dirty)
    }

    /// Contiguous grid row ranges covering every texel of `ids`.
    pub fn row_runs<'a>(&self, ids: impl IntoIterator<Item = &'a usize>) -> Vec<Range<usize>> {
        let per_instance = self.descriptor.pixels_per_instance;
        let mut rows = BTreeSet::new();
        for &id in ids {
            let first = id * per_instance;
            let last = first + per_instance - 1;
            rows.extend(first / self.side..=last / self.side);
        }

        let mut runs: Vec<Range<usize>> = Vec::new();
        for row in rows {
            match runs.last_mut() {
                Some(run) if run.end == row => run.end += 1,
                _ => runs.push(row..row + 1),
            }
        }
        runs
    }

    /// Raw bytes of the grid rows in `rows`.
    pub fn row_bytes(&self, rows: Range<usize>) -> &[u8] {
        let row_len = self.side * self.stride;
        bytemuck::cast_slice(&self.data[rows.start * row_len..rows.end * row_len])
    }

    /// Rebuilds the grid for `capacity` instances.
    ///
    /// Texels are addressed linearly, so surviving instances keep the same
    /// prefix of the buffer regardless of the new grid side.
    pub fn resize(&mut self, capacity: usize) -> Result<(), UniformError> {
        let mut resized = TexelBuffer::new(self.descriptor.with_capacity(capacity), self.stride)?;
        // Both grids hold at least this many floats, so the product fits.
        let kept = capacity.min(self.descriptor.capacity)
            * self.descriptor.pixels_per_instance
            * self.stride;
        resized.data[..kept].copy_from_slice(&self.data[..kept]);
        resized.dirty = self
            .dirty
            .iter()
            .copied()
            .filter(|id| *id < capacity)
            .collect();
        *self = resized;
        Ok(())
    }
}
