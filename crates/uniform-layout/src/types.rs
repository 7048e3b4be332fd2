use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LayoutError;

/// Scalar slots held by one RGBA texel.
pub const TEXEL_SLOTS: usize = 4;

/// Closed set of uniform kinds a schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformType {
    pub const ALL: [UniformType; 6] = [
        UniformType::Float,
        UniformType::Vec2,
        UniformType::Vec3,
        UniformType::Vec4,
        UniformType::Mat3,
        UniformType::Mat4,
    ];

    /// Number of scalar slots one value of this type occupies.
    pub fn size(self) -> usize {
        match self {
            UniformType::Float => 1,
            UniformType::Vec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 => 4,
            UniformType::Mat3 => 9,
            UniformType::Mat4 => 16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::Mat3 => "mat3",
            UniformType::Mat4 => "mat4",
        }
    }

    /// Whether the packer keeps this type on its own texel boundary.
    pub fn is_texel_aligned(self) -> bool {
        self.size() >= TEXEL_SLOTS
    }
}

impl FromStr for UniformType {
    type Err = LayoutError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim() {
            "float" => Ok(UniformType::Float),
            "vec2" => Ok(UniformType::Vec2),
            "vec3" => Ok(UniformType::Vec3),
            "vec4" => Ok(UniformType::Vec4),
            "mat3" => Ok(UniformType::Mat3),
            "mat4" => Ok(UniformType::Mat4),
            _ => Err(LayoutError::InvalidUniformType(token.to_string())),
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Components stored per texel, always within `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelCount(u8);

impl ChannelCount {
    pub const RGBA: ChannelCount = ChannelCount(4);

    pub fn new(channels: usize) -> Option<Self> {
        if (1..=TEXEL_SLOTS).contains(&channels) {
            Some(Self(channels as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
