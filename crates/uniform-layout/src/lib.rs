//! Packs per-instance uniform declarations into RGBA float texels.
//!
//! A [`UniformSchema`] names the uniforms every instance carries. [`compile`]
//! turns it into a [`UniformLayout`]: how many channels each texel stores, how
//! many texels one instance occupies, and where every uniform starts inside
//! the instance's row of scalar slots. Schemas can also be read from TOML
//! through [`SchemaManifest`].

mod compile;
mod error;
mod manifest;
mod schema;
mod types;

pub use compile::{compile, UniformEntry, UniformLayout, UniformMap};
pub use error::LayoutError;
pub use manifest::{ManifestError, SchemaManifest};
pub use schema::{UniformDeclaration, UniformSchema};
pub use types::{ChannelCount, UniformType, TEXEL_SLOTS};
