// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/output.rs - 输出定义
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

use image::GrayImage;
use thiserror::Error;
use url::Url;

use crate::query_map;

pub mod draw;
pub mod gray;

mod image_sequence;
pub use self::image_sequence::{
  ImageSequenceOutput, ImageSequenceOutputError, MANIFEST_FILE, SequenceManifest,
};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_video_output::{GStreamerVideoOutput, GStreamerVideoOutputError};

/// 输出流的固定帧率
pub const OUTPUT_FPS: u32 = 20;
pub const MIN_OUTPUT_FPS: u32 = 1;
pub const MAX_OUTPUT_FPS: u32 = 120;

#[derive(Error, Debug)]
pub enum TransformError {
  #[error("不支持的像素格式: {0}")]
  UnsupportedChannels(String),
  #[error("帧尺寸 {actual:?} 与输出尺寸 {expected:?} 不一致")]
  DimensionMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("图片序列输出错误: {0}")]
  ImageSequenceOutputError(#[from] ImageSequenceOutputError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 视频输出错误: {0}")]
  GStreamerVideoOutputError(#[from] GStreamerVideoOutputError),
  #[error("帧转换错误: {0}")]
  TransformError(#[from] TransformError),
  #[error("输出帧率无效: {0}")]
  InvalidFps(String),
  #[error("输出已经关闭")]
  Finished,
  #[error("不支持的输出 URI 方案: {0}")]
  SchemeMismatch(String),
}

/// 灰度帧输出
///
/// 尺寸与帧率在打开时确定。`finish` 之后输出必须是一个完整、可播放的文件，
/// 再次写入会返回 [`OutputError::Finished`]。
pub trait FrameSink {
  fn width(&self) -> u32;

  fn height(&self) -> u32;

  fn fps(&self) -> u32;

  fn write(&mut self, frame: &GrayImage) -> Result<(), OutputError>;

  /// 封装收尾，返回写入的总帧数
  fn finish(&mut self) -> Result<u64, OutputError>;

  fn frames_written(&self) -> u64;
}

/// 读取 `?fps=` 参数，缺省为 [`OUTPUT_FPS`]
pub fn output_fps(url: &Url) -> Result<u32, OutputError> {
  match query_map(url).get("fps") {
    None => Ok(OUTPUT_FPS),
    Some(value) => value
      .parse::<u32>()
      .ok()
      .filter(|fps| (MIN_OUTPUT_FPS..=MAX_OUTPUT_FPS).contains(fps))
      .ok_or_else(|| OutputError::InvalidFps(value.clone())),
  }
}

pub(crate) fn check_dimensions(
  frame: &GrayImage,
  width: u32,
  height: u32,
) -> Result<(), TransformError> {
  if frame.dimensions() != (width, height) {
    return Err(TransformError::DimensionMismatch {
      expected: (width, height),
      actual: frame.dimensions(),
    });
  }
  Ok(())
}

pub enum OutputWrapper {
  ImageSequence(ImageSequenceOutput),
  #[cfg(feature = "gstreamer_output")]
  GStreamerVideo(GStreamerVideoOutput),
}

impl OutputWrapper {
  /// 按 URI 方案打开输出，尺寸取自输入源
  pub fn open(url: &Url, width: u32, height: u32) -> Result<Self, OutputError> {
    match url.scheme() {
      ImageSequenceOutput::SCHEME => Ok(OutputWrapper::ImageSequence(ImageSequenceOutput::open(
        url, width, height,
      )?)),
      #[cfg(feature = "gstreamer_output")]
      GStreamerVideoOutput::SCHEME => Ok(OutputWrapper::GStreamerVideo(
        GStreamerVideoOutput::open(url, width, height)?,
      )),
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl FrameSink for OutputWrapper {
  fn width(&self) -> u32 {
    match self {
      OutputWrapper::ImageSequence(output) => output.width(),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideo(output) => output.width(),
    }
  }

  fn height(&self) -> u32 {
    match self {
      OutputWrapper::ImageSequence(output) => output.height(),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideo(output) => output.height(),
    }
  }

  fn fps(&self) -> u32 {
    match self {
      OutputWrapper::ImageSequence(output) => output.fps(),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideo(output) => output.fps(),
    }
  }

  fn write(&mut self, frame: &GrayImage) -> Result<(), OutputError> {
    match self {
      OutputWrapper::ImageSequence(output) => output.write(frame),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideo(output) => output.write(frame),
    }
  }

  fn finish(&mut self) -> Result<u64, OutputError> {
    match self {
      OutputWrapper::ImageSequence(output) => output.finish(),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideo(output) => output.finish(),
    }
  }

  fn frames_written(&self) -> u64 {
    match self {
      OutputWrapper::ImageSequence(output) => output.frames_written(),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideo(output) => output.frames_written(),
    }
  }
}
