// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/output/gray.rs - 灰度转换
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

use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::output::TransformError;

// BT.601 亮度系数，14 位定点（和为 1 << 14）
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
  let sum = R_WEIGHT * r as u32 + G_WEIGHT * g as u32 + B_WEIGHT * b as u32;
  ((sum + (1 << (SHIFT - 1))) >> SHIFT) as u8
}

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
  GrayImage::from_fn(image.width(), image.height(), |x, y| {
    let [r, g, b] = image.get_pixel(x, y).0;
    Luma([luma(r, g, b)])
  })
}

/// 转为单通道灰度图；已经是灰度的图像原样返回
pub fn to_grayscale(image: &DynamicImage) -> Result<GrayImage, TransformError> {
  match image {
    DynamicImage::ImageRgb8(rgb) => Ok(rgb_to_gray(rgb)),
    DynamicImage::ImageLuma8(gray) => Ok(gray.clone()),
    other => Err(TransformError::UnsupportedChannels(format!(
      "{:?}",
      other.color()
    ))),
  }
}
