#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid uniform type: {0}")]
    InvalidUniformType(String),
    #[error("uniform schema must declare at least one uniform")]
    EmptySchema,
}
