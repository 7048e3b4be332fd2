use std::sync::Arc;

use uniform_layout::{UniformEntry, UniformLayout, UniformSchema};

use crate::storage::{StorageAllocator, StorageDescriptor, UniformStorage};
use crate::{UniformError, UniformValue};

/// Per-instance uniform component owned by an instanced object.
///
/// Starts uninitialised; [`Self::init_uniforms_per_instance`] compiles a schema
/// and allocates fresh storage, discarding whatever was stored before.
pub struct InstanceUniforms<A: StorageAllocator> {
    allocator: A,
    capacity: usize,
    ready: Option<Ready<A::Storage>>,
}

struct Ready<S> {
    layout: Arc<UniformLayout>,
    storage: S,
}

impl<A: StorageAllocator> InstanceUniforms<A> {
    pub fn new(allocator: A, capacity: usize) -> Self {
        Self {
            allocator,
            capacity,
            ready: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.is_some()
    }

    pub fn layout(&self) -> Option<&UniformLayout> {
        self.ready.as_ref().map(|ready| ready.layout.as_ref())
    }

    pub fn storage(&self) -> Option<&A::Storage> {
        self.ready.as_ref().map(|ready| &ready.storage)
    }

    pub fn storage_mut(&mut self) -> Option<&mut A::Storage> {
        self.ready.as_mut().map(|ready| &mut ready.storage)
    }

    /// Compiles `schema` and allocates storage for the current capacity.
    ///
    /// On error the previous layout and storage stay in place.
    pub fn init_uniforms_per_instance(
        &mut self,
        schema: &UniformSchema,
    ) -> Result<&UniformLayout, UniformError> {
        let layout = Arc::new(schema.compile()?);
        let descriptor = StorageDescriptor::new(Arc::clone(&layout), self.capacity);
        let storage = self.allocator.allocate(descriptor)?;

        if self.ready.is_some() {
            tracing::debug!("re-initialising per-instance uniforms; previous values discarded");
        }
        tracing::debug!(
            capacity = self.capacity,
            channels = layout.channels().get(),
            pixels_per_instance = layout.pixels_per_instance(),
            uniforms = layout.uniforms().len(),
            "initialised per-instance uniforms"
        );

        let ready = self.ready.insert(Ready { layout, storage });
        Ok(ready.layout.as_ref())
    }

    /// Stores `value` for instance `id` and marks the instance dirty.
    pub fn set_uniform_at(
        &mut self,
        id: usize,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), UniformError> {
        let ready = self.ready.as_mut().ok_or(UniformError::Uninitialized {
            operation: "set_uniform_at",
        })?;
        let entry = lookup(&ready.layout, name)?;
        ready.storage.encode(id, &entry, &value.into())?;
        ready.storage.mark_dirty(id);
        Ok(())
    }

    /// Returns a freshly shaped copy of `name` for instance `id`.
    pub fn get_uniform_at(&self, id: usize, name: &str) -> Result<UniformValue, UniformError> {
        let ready = self.ready.as_ref().ok_or(UniformError::Uninitialized {
            operation: "get_uniform_at",
        })?;
        let entry = lookup(&ready.layout, name)?;
        let mut value = UniformValue::zeroed(entry.ty);
        ready.storage.decode(id, &entry, &mut value)?;
        Ok(value)
    }

    /// Reads `name` for instance `id` into `target`, which must already have
    /// the uniform's shape.
    pub fn get_uniform_into(
        &self,
        id: usize,
        name: &str,
        target: &mut UniformValue,
    ) -> Result<(), UniformError> {
        let ready = self.ready.as_ref().ok_or(UniformError::Uninitialized {
            operation: "get_uniform_into",
        })?;
        let entry = lookup(&ready.layout, name)?;
        ready.storage.decode(id, &entry, target)
    }

    /// Changes the instance capacity, carrying stored values over when the
    /// uniforms are initialised.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), UniformError> {
        if let Some(ready) = self.ready.as_mut() {
            ready.storage.resize(capacity)?;
        }
        tracing::debug!(from = self.capacity, to = capacity, "uniform capacity changed");
        self.capacity = capacity;
        Ok(())
    }
}

fn lookup(layout: &UniformLayout, name: &str) -> Result<UniformEntry, UniformError> {
    layout
        .entry(name)
        .copied()
        .ok_or_else(|| UniformError::UnknownUniformName(name.to_string()))
}
