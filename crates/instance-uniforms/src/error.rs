use uniform_layout::{LayoutError, UniformType};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniformError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("uniforms are not initialised; call init_uniforms_per_instance before {operation}")]
    Uninitialized { operation: &'static str },
    #[error("unknown uniform '{0}'")]
    UnknownUniformName(String),
    #[error("value shape mismatch: uniform expects {expected}, value is {found}")]
    ValueShapeMismatch {
        expected: UniformType,
        found: UniformType,
    },
    #[error("instance {id} exceeds uniform storage capacity {capacity}")]
    InstanceOutOfRange { id: usize, capacity: usize },
    #[error("failed to allocate uniform storage: {0}")]
    Allocation(String),
}
