//! 叠加渲染器消费的检测框二进制协议
//!
//! 字段编号构成线上契约，修改字段语义必须升级协议版本。

use prost::Message;

use crate::geometry::{BoundingBox, BoundingBoxSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MarkupSource {
    DetectionAlgorithm = 0,
    TrackingFilled = 1,
    Animation = 2,
}

impl MarkupSource {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            MarkupSource::DetectionAlgorithm => "DETECTION_ALGORITHM",
            MarkupSource::TrackingFilled => "TRACKING_FILLED",
            MarkupSource::Animation => "ANIMATION",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "DETECTION_ALGORITHM" => Some(MarkupSource::DetectionAlgorithm),
            "TRACKING_FILLED" => Some(MarkupSource::TrackingFilled),
            "ANIMATION" => Some(MarkupSource::Animation),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BoundingBoxMarkup {
    #[prost(int32, tag = "1")]
    pub x: i32,
    #[prost(int32, tag = "2")]
    pub y: i32,
    #[prost(int32, tag = "3")]
    pub width: i32,
    #[prost(int32, tag = "4")]
    pub height: i32,
    #[prost(double, tag = "5")]
    pub rotation_degrees: f64,
    #[prost(bool, tag = "6")]
    pub flip: bool,
    #[prost(int32, tag = "7")]
    pub red: i32,
    #[prost(int32, tag = "8")]
    pub green: i32,
    #[prost(int32, tag = "9")]
    pub blue: i32,
    #[prost(enumeration = "MarkupSource", tag = "10")]
    pub source: i32,
    #[prost(bool, tag = "11")]
    pub moving: bool,
    #[prost(bool, tag = "12")]
    pub exemplar: bool,
    #[prost(string, optional, tag = "13")]
    pub label: Option<String>,
}

impl BoundingBox {
    /// 字段一一映射；来源按名称映射；无标签时不写入 `label` 字段
    pub fn to_markup(&self) -> BoundingBoxMarkup {
        BoundingBoxMarkup {
            x: self.x(),
            y: self.y(),
            width: self.width(),
            height: self.height(),
            rotation_degrees: self.rotation_degrees(),
            flip: self.flip(),
            red: i32::from(self.red()),
            green: i32::from(self.green()),
            blue: i32::from(self.blue()),
            source: markup_source(self.source()) as i32,
            moving: self.moving(),
            exemplar: self.exemplar(),
            label: self.label().map(str::to_string),
        }
    }

    pub fn encode_markup(&self) -> Vec<u8> {
        self.to_markup().encode_to_vec()
    }
}

fn markup_source(source: BoundingBoxSource) -> MarkupSource {
    // 两侧枚举共享名称集合，未知名称只会出现在新增来源未同步协议时
    MarkupSource::from_str_name(source.name()).unwrap_or_default()
}
