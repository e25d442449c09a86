// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/model/ssd.rs - SSD 目标检测模型（tract ONNX 推理）
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

//! 基于 tract 的 SSD 检测模型。
//!
//! 模型需要是 TensorFlow Object Detection API 风格的 ONNX 导出：
//! 输入为 `uint8 [1, H, W, 3]`，输出包含
//! `detection_boxes [1, N, 4]`（`y1, x1, y2, x2` 归一化坐标）、
//! `detection_classes [1, N]` 与 `detection_scores [1, N]`。
//!
//! # URL 格式
//!
//! - `ssd:///path/to/model.onnx`
//! - `ssd:///path/to/model.onnx?size=320&recall=0.05&label_offset=1`
//! - `file:///path/to/model.onnx`（扩展名为 `.onnx` 时等价于 `ssd://`）
//!
//! `recall` 为模型内部召回阈值，低于该分数的候选框直接丢弃；
//! 类别与置信度策略由上层的筛选器负责。

use std::path::PathBuf;

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, query_map, url_to_path,
  model::{DetectItem, DetectResult, Model},
};

const SSD_SCHEME: &str = "ssd";
const DEFAULT_INPUT_SIZE: u32 = 300;
const DEFAULT_RECALL_THRESHOLD: f32 = 0.01;
const DEFAULT_LABEL_OFFSET: u32 = 1;

#[derive(Error, Debug)]
pub enum SsdModelError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("参数验证错误: {0}")]
  ValidationError(String),
  #[error("tract 错误: {0}")]
  TractError(TractError),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
}

impl From<TractError> for SsdModelError {
  fn from(err: TractError) -> Self {
    SsdModelError::TractError(err)
  }
}

pub struct SsdModelBuilder {
  model_path: PathBuf,
  input_size: u32,
  recall: f32,
  label_offset: u32,
}

impl SsdModelBuilder {
  pub fn accepts(scheme: &str) -> bool {
    scheme == SSD_SCHEME || scheme == "file"
  }

  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      input_size: DEFAULT_INPUT_SIZE,
      recall: DEFAULT_RECALL_THRESHOLD,
      label_offset: DEFAULT_LABEL_OFFSET,
    }
  }

  pub fn input_size(mut self, size: u32) -> Self {
    self.input_size = size;
    self
  }

  pub fn recall(mut self, recall: f32) -> Self {
    self.recall = recall;
    self
  }

  pub fn label_offset(mut self, offset: u32) -> Self {
    self.label_offset = offset;
    self
  }

  pub fn build(self) -> Result<SsdModel, SsdModelError> {
    info!("加载模型文件: {}", self.model_path.display());
    let size = self.input_size as usize;

    let model = tract_onnx::onnx()
      .model_for_path(&self.model_path)?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(u8::datum_type(), tvec!(1, size, size, 3)),
      )?;
    let outputs = OutputLayout::resolve(&model)?;
    debug!("模型输出布局: {:?}", outputs);

    let plan = model.into_optimized()?.into_runnable()?;
    info!("模型加载完成，输入尺寸 {}x{}", size, size);

    Ok(SsdModel {
      plan,
      outputs,
      input_size: self.input_size,
      recall: self.recall,
      label_offset: self.label_offset,
    })
  }
}

impl FromUrl for SsdModelBuilder {
  type Error = SsdModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !Self::accepts(url.scheme()) {
      return Err(SsdModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        SSD_SCHEME
      )));
    }

    let model_path = url_to_path(url);
    if url.scheme() == "file"
      && model_path.extension().and_then(|ext| ext.to_str()) != Some("onnx")
    {
      return Err(SsdModelError::ModelPathError(format!(
        "不支持的模型文件: {}",
        model_path.display()
      )));
    }

    let query = query_map(url);
    let mut builder = SsdModelBuilder::new(model_path);
    if let Some(size) = query.get("size") {
      let size = size
        .parse::<u32>()
        .ok()
        .filter(|size| *size > 0)
        .ok_or_else(|| SsdModelError::ValidationError(format!("size={}", size)))?;
      builder = builder.input_size(size);
    }
    if let Some(recall) = query.get("recall") {
      let recall = recall
        .parse::<f32>()
        .ok()
        .filter(|r| (0.0..=1.0).contains(r))
        .ok_or_else(|| SsdModelError::ValidationError(format!("recall={}", recall)))?;
      builder = builder.recall(recall);
    }
    if let Some(offset) = query.get("label_offset") {
      let offset = offset
        .parse::<u32>()
        .map_err(|_| SsdModelError::ValidationError(format!("label_offset={}", offset)))?;
      builder = builder.label_offset(offset);
    }

    Ok(builder)
  }
}

/// 各输出张量在模型输出列表中的位置
#[derive(Debug, Clone, Copy)]
struct OutputLayout {
  boxes: usize,
  classes: usize,
  scores: usize,
}

impl OutputLayout {
  fn resolve(model: &InferenceModel) -> Result<Self, SsdModelError> {
    let names: Vec<String> = model
      .output_outlets()?
      .iter()
      .map(|outlet| {
        model
          .outlet_label(*outlet)
          .map(str::to_string)
          .unwrap_or_else(|| model.node(outlet.node).name.clone())
          .to_lowercase()
      })
      .collect();

    let find = |key: &str| names.iter().position(|name| name.contains(key));
    match (find("box"), find("class"), find("score")) {
      (Some(boxes), Some(classes), Some(scores)) => Ok(OutputLayout {
        boxes,
        classes,
        scores,
      }),
      // TF 导出的默认顺序
      _ if names.len() >= 3 => Ok(OutputLayout {
        boxes: 0,
        classes: 1,
        scores: 2,
      }),
      _ => Err(SsdModelError::InvalidOutput(format!(
        "模型只有 {} 个输出: {:?}",
        names.len(),
        names
      ))),
    }
  }
}

pub struct SsdModel {
  plan: TypedRunnableModel<TypedModel>,
  outputs: OutputLayout,
  input_size: u32,
  recall: f32,
  label_offset: u32,
}

impl SsdModel {
  fn build_input(&self, image: &RgbImage) -> Tensor {
    let size = self.input_size;
    let resized = if image.dimensions() == (size, size) {
      image.clone()
    } else {
      image::imageops::resize(image, size, size, FilterType::Triangle)
    };

    tract_ndarray::Array4::from_shape_fn(
      (1, size as usize, size as usize, 3),
      |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c],
    )
    .into_tensor()
  }

  fn decode(&self, outputs: TVec<TValue>) -> Result<DetectResult, SsdModelError> {
    let tensor = |index: usize| {
      outputs
        .get(index)
        .ok_or_else(|| SsdModelError::InvalidOutput(format!("缺少输出 {}", index)))
    };

    let boxes = tensor(self.outputs.boxes)?.cast_to::<f32>()?;
    let classes = tensor(self.outputs.classes)?.cast_to::<f32>()?;
    let scores = tensor(self.outputs.scores)?.cast_to::<f32>()?;

    let boxes = boxes.as_slice::<f32>()?;
    let classes = classes.as_slice::<f32>()?;
    let scores = scores.as_slice::<f32>()?;

    let count = scores.len().min(classes.len()).min(boxes.len() / 4);
    let mut items = Vec::new();
    for i in 0..count {
      let score = scores[i];
      if score < self.recall {
        continue;
      }
      let raw_class = classes[i].round() as i64 - self.label_offset as i64;
      if raw_class < 0 {
        continue;
      }
      let bbox = [
        boxes[i * 4],
        boxes[i * 4 + 1],
        boxes[i * 4 + 2],
        boxes[i * 4 + 3],
      ];
      items.push(DetectItem::new(raw_class as u32, score, bbox));
    }

    Ok(DetectResult::from(items))
  }
}

impl Model for SsdModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = SsdModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.build_input(input);
    let outputs = self.plan.run(tvec!(tensor.into()))?;
    self.decode(outputs)
  }
}
