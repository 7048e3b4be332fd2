use crate::{LayoutError, UniformType};

/// One named entry of a [`UniformSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDeclaration {
    pub name: String,
    pub ty: UniformType,
}

/// Ordered set of per-instance uniform declarations.
///
/// Names are unique. Declaring a name twice keeps the first position and
/// replaces the type, so the later declaration wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformSchema {
    declarations: Vec<UniformDeclaration>,
}

impl UniformSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from raw `(name, type token)` pairs.
    pub fn from_tokens<I, N, T>(pairs: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: AsRef<str>,
    {
        let mut schema = Self::new();
        for (name, token) in pairs {
            schema.declare_str(name, token.as_ref())?;
        }
        Ok(schema)
    }

    /// Declares `name`, returning the type it replaced if it was already present.
    pub fn declare(&mut self, name: impl Into<String>, ty: UniformType) -> Option<UniformType> {
        let name = name.into();
        if let Some(existing) = self.declarations.iter_mut().find(|decl| decl.name == name) {
            tracing::debug!(name = %name, previous = %existing.ty, next = %ty, "uniform redeclared");
            return Some(std::mem::replace(&mut existing.ty, ty));
        }
        self.declarations.push(UniformDeclaration { name, ty });
        None
    }

    /// Parses `token` as a [`UniformType`] and declares it.
    pub fn declare_str(
        &mut self,
        name: impl Into<String>,
        token: &str,
    ) -> Result<Option<UniformType>, LayoutError> {
        let ty = token.parse()?;
        Ok(self.declare(name, ty))
    }

    pub fn with(mut self, name: impl Into<String>, ty: UniformType) -> Self {
        self.declare(name, ty);
        self
    }

    pub fn get(&self, name: &str) -> Option<UniformType> {
        self.declarations
            .iter()
            .find(|decl| decl.name == name)
            .map(|decl| decl.ty)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declarations in the order they were first declared.
    pub fn iter(&self) -> impl Iterator<Item = &UniformDeclaration> {
        self.declarations.iter()
    }

    /// Total scalar slots demanded by every declaration.
    pub fn total_slots(&self) -> usize {
        self.declarations.iter().map(|decl| decl.ty.size()).sum()
    }
}

impl<N: Into<String>> FromIterator<(N, UniformType)> for UniformSchema {
    fn from_iter<I: IntoIterator<Item = (N, UniformType)>>(iter: I) -> Self {
        let mut schema = Self::new();
        for (name, ty) in iter {
            schema.declare(name, ty);
        }
        schema
    }
}
