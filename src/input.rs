// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod image_sequence;
pub use self::image_sequence::{ImageSequenceInput, ImageSequenceInputError};

mod test_pattern;
pub use self::test_pattern::{TestPatternInput, TestPatternInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

/// 输入源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSourceType {
  /// 图片序列目录
  ImageSequence,
  /// 合成测试图案
  TestPattern,
  /// 解码后的视频流（文件或网络）
  Stream,
}

/// 输入源 trait
///
/// 打开之后即可查询尺寸与声明帧率；帧通过迭代器惰性读取，读完即止，不可重来。
/// 迭代器返回 `None` 表示流结束，返回 `Some(Err(..))` 表示读取失败。
pub trait FrameSource: Iterator<Item = Result<Frame, InputError>> {
  /// 获取输入源类型
  fn source_type(&self) -> InputSourceType;

  /// 获取帧宽度
  fn width(&self) -> u32;

  /// 获取帧高度
  fn height(&self) -> u32;

  /// 获取声明帧率（如果适用）
  fn fps(&self) -> Option<f64>;
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图片序列输入错误: {0}")]
  ImageSequenceInputError(#[from] ImageSequenceInputError),
  #[error("测试图案输入错误: {0}")]
  TestPatternInputError(#[from] TestPatternInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 输入错误: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("不支持的输入 URI 方案: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  ImageSequence(ImageSequenceInput),
  TestPattern(TestPatternInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamer(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageSequenceInput::SCHEME => Ok(InputWrapper::ImageSequence(
        ImageSequenceInput::from_url(url)?,
      )),
      TestPatternInput::SCHEME => Ok(InputWrapper::TestPattern(TestPatternInput::from_url(
        url,
      )?)),
      #[cfg(feature = "gstreamer_input")]
      scheme if GStreamerInput::accepts(scheme) => {
        Ok(InputWrapper::GStreamer(GStreamerInput::from_url(url)?))
      }
      scheme => Err(InputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ImageSequence(input) => input.next(),
      InputWrapper::TestPattern(input) => input.next(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.next(),
    }
  }
}

impl FrameSource for InputWrapper {
  fn source_type(&self) -> InputSourceType {
    match self {
      InputWrapper::ImageSequence(input) => input.source_type(),
      InputWrapper::TestPattern(input) => input.source_type(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.source_type(),
    }
  }

  fn width(&self) -> u32 {
    match self {
      InputWrapper::ImageSequence(input) => input.width(),
      InputWrapper::TestPattern(input) => input.width(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.width(),
    }
  }

  fn height(&self) -> u32 {
    match self {
      InputWrapper::ImageSequence(input) => input.height(),
      InputWrapper::TestPattern(input) => input.height(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.height(),
    }
  }

  fn fps(&self) -> Option<f64> {
    match self {
      InputWrapper::ImageSequence(input) => input.fps(),
      InputWrapper::TestPattern(input) => input.fps(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input.fps(),
    }
  }
}
