use uniform_layout::UniformEntry;

use super::{StorageAllocator, StorageDescriptor, TexelBuffer, UniformStorage};
use crate::{UniformError, UniformValue};

/// Allocates [`MemoryStorage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryAllocator;

impl StorageAllocator for MemoryAllocator {
    type Storage = MemoryStorage;

    fn allocate(&self, descriptor: StorageDescriptor) -> Result<MemoryStorage, UniformError> {
        MemoryStorage::new(descriptor)
    }
}

/// Array-backed storage with no GPU counterpart.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    texels: TexelBuffer,
}

impl MemoryStorage {
    pub fn new(descriptor: StorageDescriptor) -> Result<Self, UniformError> {
        let stride = descriptor.channels.get();
        Ok(Self {
            texels: TexelBuffer::new(descriptor, stride)?,
        })
    }

    pub fn texels(&self) -> &TexelBuffer {
        &self.texels
    }

    /// Clears the dirty set as an upload would, returning what was pending.
    pub fn take_dirty(&mut self) -> Vec<usize> {
        self.texels.take_dirty().into_iter().collect()
    }
}

impl UniformStorage for MemoryStorage {
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
        self.texels.resize(capacity)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uniform_layout::{UniformSchema, UniformType};

    use super::*;

    fn storage(schema: &UniformSchema, capacity: usize) -> MemoryStorage {
        let layout = Arc::new(schema.compile().unwrap());
        MemoryAllocator
            .allocate(StorageDescriptor::new(layout, capacity))
            .unwrap()
    }

    #[test]
    fn sizes_square_grid_from_capacity() {
        let schema = UniformSchema::new().with("m", UniformType::Mat4);
        let store = storage(&schema, 10);
        // 10 instances * 4 texels = 40 texels -> 7x7 grid.
        assert_eq!(store.texels().side(), 7);
        assert_eq!(store.texels().data().len(), 7 * 7 * 4);
    }

    #[test]
    fn narrow_layouts_use_narrow_texels() {
        let schema = UniformSchema::new().with("x", UniformType::Float);
        let mut store = storage(&schema, 9);
        let entry = *store.descriptor().layout.entry("x").unwrap();
        store.encode(4, &entry, &UniformValue::Float(2.5)).unwrap();

        assert_eq!(store.texels().stride(), 1);
        assert_eq!(store.texels().data()[4], 2.5);
    }

    #[test]
    fn instances_do_not_share_texels() {
        let schema = UniformSchema::new()
            .with("a", UniformType::Vec3)
            .with("b", UniformType::Vec3)
            .with("c", UniformType::Vec2);
        let mut store = storage(&schema, 2);
        let c = *store.descriptor().layout.entry("c").unwrap();
        let a = *store.descriptor().layout.entry("a").unwrap();

        store.encode(0, &c, &UniformValue::Vec2([7.0, 8.0])).unwrap();
        store
            .encode(1, &a, &UniformValue::Vec3([1.0, 2.0, 3.0]))
            .unwrap();

        let mut back = UniformValue::zeroed(UniformType::Vec2);
        store.decode(0, &c, &mut back).unwrap();
        assert_eq!(back, UniformValue::Vec2([7.0, 8.0]));
    }

    #[test]
    fn out_of_range_instance_is_rejected_without_writing() {
        let schema = UniformSchema::new().with("v", UniformType::Vec4);
        let mut store = storage(&schema, 2);
        let entry = *store.descriptor().layout.entry("v").unwrap();
        let err = store
            .encode(2, &entry, &UniformValue::Vec4([1.0; 4]))
            .unwrap_err();

        assert_eq!(err, UniformError::InstanceOutOfRange { id: 2, capacity: 2 });
        assert!(store.texels().data().iter().all(|value| *value == 0.0));
    }

    #[test]
    fn row_runs_merge_adjacent_rows() {
        let schema = UniformSchema::new().with("v", UniformType::Vec4);
        let mut store = storage(&schema, 16);
        // 16 texels -> 4x4 grid, one texel per instance.
        for id in [0, 1, 5, 6, 15] {
            store.mark_dirty(id);
        }
        let dirty = store.texels().dirty().clone();
        assert_eq!(store.texels().row_runs(&dirty), vec![0..2, 3..4]);
        assert_eq!(store.texels().row_bytes(0..2).len(), 2 * 4 * 4 * 4);
    }

    #[test]
    fn resize_keeps_surviving_instances() {
        let schema = UniformSchema::new()
            .with("m", UniformType::Mat3)
            .with("f", UniformType::Float);
        let mut store = storage(&schema, 4);
        let m = *store.descriptor().layout.entry("m").unwrap();
        let value = UniformValue::Mat3([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        store.encode(3, &m, &value).unwrap();
        store.mark_dirty(3);

        store.resize(64).unwrap();
        let mut back = UniformValue::zeroed(UniformType::Mat3);
        store.decode(3, &m, &mut back).unwrap();
        assert_eq!(back, value);
        assert_eq!(store.dirty_instances(), vec![3]);

        store.resize(2).unwrap();
        assert!(store.dirty_instances().is_empty());
        assert!(matches!(
            store.decode(3, &m, &mut back),
            Err(UniformError::InstanceOutOfRange { .. })
        ));
    }
}
