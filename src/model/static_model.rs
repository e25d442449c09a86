// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/model/static_model.rs - 固定检测结果模型
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

//! 对每一帧都返回同一组检测框的模型，用于空跑流水线与测试。
//!
//! # URL 格式
//!
//! - `static://` - 不返回任何检测框
//! - `static://?det=0,0,1,1,person,0.9` - 每帧返回一个全画面的 person 框
//!
//! `det` 可以重复出现，格式为 `y1,x1,y2,x2,类别,分数`，类别可以是名称或编号。

use image::RgbImage;
use std::convert::Infallible;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult, Model, class_id_of},
};

#[derive(Error, Debug)]
pub enum StaticModelError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("检测框参数格式错误: {0}")]
  InvalidDetection(String),
}

const STATIC_MODEL_SCHEME: &str = "static";

#[derive(Debug, Clone, Default)]
pub struct StaticModel {
  items: Box<[DetectItem]>,
}

impl StaticModel {
  pub fn new(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }

  fn parse_detection(value: &str) -> Result<DetectItem, StaticModelError> {
    let invalid = || StaticModelError::InvalidDetection(value.to_string());
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 6 {
      return Err(invalid());
    }

    let mut bbox = [0.0f32; 4];
    for (slot, part) in bbox.iter_mut().zip(&parts[..4]) {
      *slot = part.parse().map_err(|_| invalid())?;
    }
    let class_id = class_id_of(parts[4]).ok_or_else(invalid)?;
    let score = parts[5].parse().map_err(|_| invalid())?;

    Ok(DetectItem::new(class_id, score, bbox))
  }
}

impl FromUrlWithScheme for StaticModel {
  const SCHEME: &'static str = STATIC_MODEL_SCHEME;
}

impl FromUrl for StaticModel {
  type Error = StaticModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(StaticModelError::SchemeMismatch);
    }

    let items = url
      .query_pairs()
      .filter(|(k, _)| k == "det")
      .map(|(_, v)| Self::parse_detection(&v))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(StaticModel::new(items))
  }
}

impl Model for StaticModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = Infallible;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(DetectResult {
      items: self.items.clone(),
    })
  }
}
