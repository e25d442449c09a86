// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/frame.rs - 帧定义
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

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 根据声明帧率推算第 `index` 帧的时间戳
pub(crate) fn timestamp_for(index: u64, fps: Option<f64>) -> u64 {
  match fps {
    Some(fps) if fps > 0.0 => (index as f64 * 1000.0 / fps) as u64,
    _ => 0,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_follow_declared_rate() {
    assert_eq!(timestamp_for(0, Some(20.0)), 0);
    assert_eq!(timestamp_for(20, Some(20.0)), 1000);
    assert_eq!(timestamp_for(3, Some(25.0)), 120);
    assert_eq!(timestamp_for(7, None), 0);
    assert_eq!(timestamp_for(7, Some(0.0)), 0);
  }
}
