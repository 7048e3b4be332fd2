//! TOML manifests declaring a uniform schema.
//!
//! ```toml
//! version = 1
//! capacity = 1024
//!
//! [uniforms]
//! tint = "vec3"
//! opacity = "float"
//! ```
//!
//! Uniforms keep the order they are written in, which decides placement among
//! declarations of equal size.
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{LayoutError, UniformLayout, UniformSchema};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read schema manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse schema manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid schema manifest: {0}")]
    Invalid(String),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    version: u32,
    #[serde(default)]
    capacity: Option<usize>,
    #[serde(default)]
    uniforms: toml::Table,
}

/// A schema plus the instance capacity tools should allocate for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaManifest {
    pub version: u32,
    pub capacity: Option<usize>,
    pub schema: UniformSchema,
}

impl SchemaManifest {
    pub fn from_toml_str(input: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(input)?;
        if raw.version != 1 {
            return Err(ManifestError::Invalid(format!(
                "unsupported manifest version {}; expected 1",
                raw.version
            )));
        }
        if raw.capacity == Some(0) {
            return Err(ManifestError::Invalid(
                "capacity must be greater than zero".into(),
            ));
        }

        let mut schema = UniformSchema::new();
        for (name, value) in &raw.uniforms {
            let token = value.as_str().ok_or_else(|| {
                ManifestError::Invalid(format!(
                    "uniform '{name}' must be a type string such as \"vec3\""
                ))
            })?;
            schema.declare_str(name.as_str(), token)?;
        }
        if schema.is_empty() {
            return Err(LayoutError::EmptySchema.into());
        }

        Ok(Self {
            version: raw.version,
            capacity: raw.capacity,
            schema,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::from_toml_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            uniforms = manifest.schema.len(),
            capacity = ?manifest.capacity,
            "loaded schema manifest"
        );
        Ok(manifest)
    }

    pub fn layout(&self) -> Result<UniformLayout, LayoutError> {
        self.schema.compile()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::UniformType;

    const SAMPLE: &str = r#"
version = 1
capacity = 256

[uniforms]
tint = "vec3"
opacity = "float"
offset = "vec2"
"#;

    #[test]
    fn parses_sample_manifest_in_written_order() {
        let manifest = SchemaManifest::from_toml_str(SAMPLE).expect("parse manifest");
        assert_eq!(manifest.capacity, Some(256));
        let names: Vec<&str> = manifest
            .schema
            .iter()
            .map(|decl| decl.name.as_str())
            .collect();
        assert_eq!(names, vec!["tint", "opacity", "offset"]);
        assert_eq!(manifest.schema.get("offset"), Some(UniformType::Vec2));

        let layout = manifest.layout().unwrap();
        assert_eq!(layout.entry("opacity").unwrap().offset, 3);
        assert_eq!(layout.entry("offset").unwrap().offset, 4);
    }

    #[test]
    fn rejects_unknown_type_token() {
        let err = SchemaManifest::from_toml_str(
            r#"
version = 1

[uniforms]
color = "rgb"
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Layout(LayoutError::InvalidUniformType(ref token)) if token == "rgb"
        ));
    }

    #[test]
    fn rejects_empty_uniform_table() {
        let err = SchemaManifest::from_toml_str("version = 1\n[uniforms]\n").unwrap_err();
        assert!(matches!(err, ManifestError::Layout(LayoutError::EmptySchema)));
    }

    #[test]
    fn rejects_bad_version_and_capacity() {
        let err = SchemaManifest::from_toml_str("version = 2\n[uniforms]\na = \"float\"\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));

        let err = SchemaManifest::from_toml_str(
            "version = 1\ncapacity = 0\n[uniforms]\na = \"float\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn rejects_non_string_types() {
        let err = SchemaManifest::from_toml_str("version = 1\n[uniforms]\na = 3\n").unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn loads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.toml");
        fs::write(&path, SAMPLE).unwrap();

        let manifest = SchemaManifest::from_path(&path).unwrap();
        assert_eq!(manifest.schema.len(), 3);

        let missing = SchemaManifest::from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ManifestError::Io { .. }));
    }
}
