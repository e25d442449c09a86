// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::model::DetectItem;

/// 边框颜色（绿色）
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
/// 边框线宽（像素）
pub const BOX_THICKNESS: u32 = 2;

/// 像素坐标下的矩形，两角均包含在内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub x_min: u32,
  pub y_min: u32,
  pub x_max: u32,
  pub y_max: u32,
}

fn to_pixel(value: f32, extent: u32) -> u32 {
  // NaN 转为 0，正负无穷分别饱和
  let scaled = (value * extent as f32).trunc();
  (scaled.max(0.0) as u32).min(extent.saturating_sub(1))
}

/// 把 `[y1, x1, y2, x2]` 归一化坐标换算为像素坐标，截断后夹紧到画面内
pub fn denormalize(item: &DetectItem, width: u32, height: u32) -> PixelRect {
  let xa = to_pixel(item.x1(), width);
  let xb = to_pixel(item.x2(), width);
  let ya = to_pixel(item.y1(), height);
  let yb = to_pixel(item.y2(), height);

  PixelRect {
    x_min: xa.min(xb),
    y_min: ya.min(yb),
    x_max: xa.max(xb),
    y_max: ya.max(yb),
  }
}

fn draw_box(image: &mut RgbImage, rect: PixelRect) {
  for inset in 0..BOX_THICKNESS {
    let x_min = (rect.x_min + inset).min(rect.x_max);
    let y_min = (rect.y_min + inset).min(rect.y_max);
    let x_max = rect.x_max.saturating_sub(inset).max(x_min);
    let y_max = rect.y_max.saturating_sub(inset).max(y_min);

    let outline = Rect::at(x_min as i32, y_min as i32)
      .of_size(x_max - x_min + 1, y_max - y_min + 1);
    draw_hollow_rect_mut(image, outline, Rgb(BOX_COLOR));
  }
}

/// 在帧的副本上依次绘制检测框，原帧不变
pub fn annotate(image: &RgbImage, items: &[DetectItem]) -> RgbImage {
  let mut canvas = image.clone();
  if canvas.width() == 0 || canvas.height() == 0 {
    return canvas;
  }
  for item in items {
    let rect = denormalize(item, canvas.width(), canvas.height());
    draw_box(&mut canvas, rect);
  }
  canvas
}
