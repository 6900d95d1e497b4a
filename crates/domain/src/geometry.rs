//! 检测框几何模型

use std::hash::{Hash, Hasher};

use mediaflow_errors::{MediaflowError, MediaflowResult};
use serde::{Deserialize, Serialize};

/// 检测框的来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundingBoxSource {
    #[default]
    DetectionAlgorithm,
    TrackingFilled,
    Animation,
}

impl BoundingBoxSource {
    pub fn name(&self) -> &'static str {
        match self {
            BoundingBoxSource::DetectionAlgorithm => "DETECTION_ALGORITHM",
            BoundingBoxSource::TrackingFilled => "TRACKING_FILLED",
            BoundingBoxSource::Animation => "ANIMATION",
        }
    }
}

/// 不可变的检测框
///
/// 颜色分量在构造时校验，越界直接拒绝而非截断。`label` 为 `None` 与空字符串语义不同。
/// 所有字段参与相等与哈希，`rotation_degrees` 按位比较以满足 `Eq`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BoundingBoxBuilder")]
pub struct BoundingBox {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    rotation_degrees: f64,
    flip: bool,
    red: u8,
    green: u8,
    blue: u8,
    source: BoundingBoxSource,
    moving: bool,
    exemplar: bool,
    label: Option<String>,
}

impl BoundingBox {
    pub fn builder(x: i32, y: i32, width: i32, height: i32) -> BoundingBoxBuilder {
        BoundingBoxBuilder {
            x,
            y,
            width,
            height,
            ..BoundingBoxBuilder::default()
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    pub fn source(&self) -> BoundingBoxSource {
        self.source
    }

    pub fn moving(&self) -> bool {
        self.moving
    }

    pub fn exemplar(&self) -> bool {
        self.exemplar
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
            && self.rotation_degrees.to_bits() == other.rotation_degrees.to_bits()
            && self.flip == other.flip
            && self.red == other.red
            && self.green == other.green
            && self.blue == other.blue
            && self.source == other.source
            && self.moving == other.moving
            && self.exemplar == other.exemplar
            && self.label == other.label
    }
}

impl Eq for BoundingBox {}

impl Hash for BoundingBox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
        self.width.hash(state);
        self.height.hash(state);
        self.rotation_degrees.to_bits().hash(state);
        self.flip.hash(state);
        self.red.hash(state);
        self.green.hash(state);
        self.blue.hash(state);
        self.source.hash(state);
        self.moving.hash(state);
        self.exemplar.hash(state);
        self.label.hash(state);
    }
}

/// 检测框构建器，`build` 时校验
///
/// 默认值：无旋转、不翻转、黑色、来源为检测算法、moving 为真、非 exemplar、无标签。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoundingBoxBuilder {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    rotation_degrees: f64,
    flip: bool,
    red: i32,
    green: i32,
    blue: i32,
    source: BoundingBoxSource,
    moving: bool,
    exemplar: bool,
    label: Option<String>,
}

impl Default for BoundingBoxBuilder {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            rotation_degrees: 0.0,
            flip: false,
            red: 0,
            green: 0,
            blue: 0,
            source: BoundingBoxSource::DetectionAlgorithm,
            moving: true,
            exemplar: false,
            label: None,
        }
    }
}

impl BoundingBoxBuilder {
    pub fn rotation_degrees(mut self, degrees: f64) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    pub fn color(mut self, red: i32, green: i32, blue: i32) -> Self {
        self.red = red;
        self.green = green;
        self.blue = blue;
        self
    }

    pub fn source(mut self, source: BoundingBoxSource) -> Self {
        self.source = source;
        self
    }

    pub fn moving(mut self, moving: bool) -> Self {
        self.moving = moving;
        self
    }

    pub fn exemplar(mut self, exemplar: bool) -> Self {
        self.exemplar = exemplar;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> MediaflowResult<BoundingBox> {
        Ok(BoundingBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotation_degrees: self.rotation_degrees,
            flip: self.flip,
            red: color_channel("red", self.red)?,
            green: color_channel("green", self.green)?,
            blue: color_channel("blue", self.blue)?,
            source: self.source,
            moving: self.moving,
            exemplar: self.exemplar,
            label: self.label,
        })
    }
}

impl TryFrom<BoundingBoxBuilder> for BoundingBox {
    type Error = MediaflowError;

    fn try_from(builder: BoundingBoxBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

fn color_channel(channel: &str, value: i32) -> MediaflowResult<u8> {
    u8::try_from(value).map_err(|_| {
        MediaflowError::validation_error(format!(
            "颜色分量 {channel} 必须在 [0, 255] 范围内，实际为 {value}"
        ))
    })
}
