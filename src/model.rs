// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/model.rs - 模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [y_min, x_min, y_max, x_max]，归一化坐标
}

impl DetectItem {
  pub fn new(class_id: u32, score: f32, bbox: [f32; 4]) -> Self {
    Self {
      class_id,
      score,
      bbox,
    }
  }

  pub fn y1(&self) -> f32 {
    self.bbox[0]
  }

  pub fn x1(&self) -> f32 {
    self.bbox[1]
  }

  pub fn y2(&self) -> f32 {
    self.bbox[2]
  }

  pub fn x2(&self) -> f32 {
    self.bbox[3]
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

// COCO 80 类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

pub fn label_of(class_id: u32) -> &'static str {
  COCO_CLASSES
    .get(class_id as usize)
    .copied()
    .unwrap_or("unknown")
}

/// 按名称或数字解析类别编号
pub fn class_id_of(name: &str) -> Option<u32> {
  let name = name.trim();
  if let Ok(id) = name.parse::<u32>() {
    return Some(id);
  }
  COCO_CLASSES
    .iter()
    .position(|label| label.eq_ignore_ascii_case(name))
    .map(|index| index as u32)
}

mod service;
pub use self::service::{InferenceClient, InferenceService, ServiceError};

mod static_model;
pub use self::static_model::{StaticModel, StaticModelError};

#[cfg(feature = "model_tract")]
mod ssd;
#[cfg(feature = "model_tract")]
pub use self::ssd::{SsdModel, SsdModelBuilder, SsdModelError};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("静态检测模型错误: {0}")]
  StaticModelError(#[from] StaticModelError),
  #[cfg(feature = "model_tract")]
  #[error("SSD 模型错误: {0}")]
  SsdModelError(#[from] SsdModelError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ModelWrapper {
  Static(StaticModel),
  #[cfg(feature = "model_tract")]
  Ssd(SsdModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      StaticModel::SCHEME => Ok(ModelWrapper::Static(StaticModel::from_url(url)?)),
      #[cfg(feature = "model_tract")]
      scheme if SsdModelBuilder::accepts(scheme) => {
        let model = SsdModelBuilder::from_url(url)?.build()?;
        Ok(ModelWrapper::Ssd(model))
      }
      scheme => Err(ModelError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Model for ModelWrapper {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      ModelWrapper::Static(model) => match model.infer(input) {
        Ok(result) => Ok(result),
        Err(never) => match never {},
      },
      #[cfg(feature = "model_tract")]
      ModelWrapper::Ssd(model) => model.infer(input).map_err(ModelError::from),
    }
  }
}
