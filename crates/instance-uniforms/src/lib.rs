//! Per-instance uniform data for instanced draws.
//!
//! The flow from schema to GPU looks like:
//!
//! ```text
//!   UniformSchema ──compile──▶ UniformLayout ──allocate──▶ UniformStorage
//!                                                        │
//!   set_uniform_at(id, name, value) ──encode + mark_dirty┘
//!   get_uniform_at(id, name) ◀──────decode────────────────
//! ```
//!
//! [`InstanceUniforms`] is the component an instanced object holds. It owns a
//! [`StorageAllocator`] and, once initialised, the compiled layout plus the
//! storage it allocated. Storage backends:
//!
//! - [`MemoryStorage`] keeps values in a plain float grid.
//! - [`TextureStorage`] mirrors that grid into a `wgpu` float texture the
//!   shader samples; the host decides when to call [`TextureStorage::flush`].

mod error;
pub mod storage;
mod uniforms;
mod value;

pub use error::UniformError;
pub use storage::{
    MemoryAllocator, MemoryStorage, StorageAllocator, StorageDescriptor, TexelBuffer,
    TextureAllocator, TextureStorage, UniformStorage,
};
pub use uniform_layout::{
    UniformEntry, UniformLayout, UniformMap, UniformSchema, UniformType,
};
pub use uniforms::InstanceUniforms;
pub use value::UniformValue;
