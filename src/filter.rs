// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/filter.rs - 检测结果筛选
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

use crate::model::DetectItem;

/// COCO 中 "person" 的类别编号（从 0 开始）
pub const PERSON_CLASS_ID: u32 = 0;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// 类别与置信度筛选策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionPolicy {
  pub target_class: u32,
  pub min_confidence: f32,
}

impl Default for DetectionPolicy {
  fn default() -> Self {
    Self {
      target_class: PERSON_CLASS_ID,
      min_confidence: DEFAULT_MIN_CONFIDENCE,
    }
  }
}

impl DetectionPolicy {
  pub fn new(target_class: u32, min_confidence: f32) -> Self {
    Self {
      target_class,
      min_confidence,
    }
  }

  pub fn accepts(&self, item: &DetectItem) -> bool {
    // NaN 分数比较结果为 false，自然被丢弃
    item.class_id == self.target_class && item.score >= self.min_confidence
  }

  pub fn filter(&self, items: &[DetectItem]) -> Vec<DetectItem> {
    items.iter().filter(|item| self.accepts(item)).copied().collect()
  }
}

/// 只保留指定类别且置信度不低于阈值的检测框
pub fn filter_detections(
  items: &[DetectItem],
  target_class: u32,
  min_confidence: f32,
) -> Vec<DetectItem> {
  DetectionPolicy::new(target_class, min_confidence).filter(items)
}
