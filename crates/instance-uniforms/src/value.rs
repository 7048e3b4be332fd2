use uniform_layout::UniformType;

use crate::UniformError;

/// A typed per-instance uniform value. Matrices are column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    /// Also carries colors, as linear `[r, g, b]`. Convert sRGB colors to
    /// linear before storing them.
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    /// All-zero value shaped for `ty`.
    pub fn zeroed(ty: UniformType) -> Self {
        match ty {
            UniformType::Float => UniformValue::Float(0.0),
            UniformType::Vec2 => UniformValue::Vec2([0.0; 2]),
            UniformType::Vec3 => UniformValue::Vec3([0.0; 3]),
            UniformType::Vec4 => UniformValue::Vec4([0.0; 4]),
            UniformType::Mat3 => UniformValue::Mat3([[0.0; 3]; 3]),
            UniformType::Mat4 => UniformValue::Mat4([[0.0; 4]; 4]),
        }
    }

    pub fn uniform_type(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Flattened scalar components in storage order.
    pub fn components(&self) -> &[f32] {
        match self {
            UniformValue::Float(value) => std::slice::from_ref(value),
            UniformValue::Vec2(value) => value,
            UniformValue::Vec3(value) => value,
            UniformValue::Vec4(value) => value,
            UniformValue::Mat3(value) => bytemuck::cast_slice(value),
            UniformValue::Mat4(value) => bytemuck::cast_slice(value),
        }
    }

    pub fn components_mut(&mut self) -> &mut [f32] {
        match self {
            UniformValue::Float(value) => std::slice::from_mut(value),
            UniformValue::Vec2(value) => value,
            UniformValue::Vec3(value) => value,
            UniformValue::Vec4(value) => value,
            UniformValue::Mat3(value) => bytemuck::cast_slice_mut(value),
            UniformValue::Mat4(value) => bytemuck::cast_slice_mut(value),
        }
    }

    pub(crate) fn expect_type(&self, expected: UniformType) -> Result<(), UniformError> {
        let found = self.uniform_type();
        if found == expected {
            Ok(())
        } else {
            Err(UniformError::ValueShapeMismatch { expected, found })
        }
    }
}

macro_rules! impl_value_conversions {
    ($($variant:ident: $raw:ty => $glam:ty, $to_raw:ident, $from_raw:expr;)*) => {
        $(
            impl From<$raw> for UniformValue {
                fn from(value: $raw) -> Self {
                    UniformValue::$variant(value)
                }
            }

            impl From<$glam> for UniformValue {
                fn from(value: $glam) -> Self {
                    UniformValue::$variant(value.$to_raw())
                }
            }

            impl TryFrom<UniformValue> for $glam {
                type Error = UniformError;

                fn try_from(value: UniformValue) -> Result<Self, Self::Error> {
                    match value {
                        UniformValue::$variant(raw) => Ok($from_raw(raw)),
                        other => Err(UniformError::ValueShapeMismatch {
                            expected: UniformType::$variant,
                            found: other.uniform_type(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_value_conversions! {
    Vec2: [f32; 2] => glam::Vec2, to_array, glam::Vec2::from_array;
    Vec3: [f32; 3] => glam::Vec3, to_array, glam::Vec3::from_array;
    Vec4: [f32; 4] => glam::Vec4, to_array, glam::Vec4::from_array;
    Mat3: [[f32; 3]; 3] => glam::Mat3, to_cols_array_2d, |raw: [[f32; 3]; 3]| {
        glam::Mat3::from_cols_array_2d(&raw)
    };
    Mat4: [[f32; 4]; 4] => glam::Mat4, to_cols_array_2d, |raw: [[f32; 4]; 4]| {
        glam::Mat4::from_cols_array_2d(&raw)
    };
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl TryFrom<UniformValue> for f32 {
    type Error = UniformError;

    fn try_from(value: UniformValue) -> Result<Self, Self::Error> {
        match value {
            UniformValue::Float(raw) => Ok(raw),
            other => Err(UniformError::ValueShapeMismatch {
                expected: UniformType::Float,
                found: other.uniform_type(),
            }),
        }
    }
}
