// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出模块
//!
//! 将灰度帧编码为视频文件。
//!
//! ## 支持的格式
//!
//! - **MP4** (H.264) - 默认
//! - **MKV** (Matroska, H.264)
//! - **AVI** (H.264)
//!
//! ## URL 格式
//!
//! `file:///path/to/output.mp4`，可选 `?fps=`（1 到 120，默认 20）。
//! 宽高由输入源决定。

use std::path::PathBuf;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::GrayImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  output::{FrameSink, OutputError, check_dimensions, output_fps},
  url_to_path,
};

/// GStreamer 视频输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  /// URI scheme 不匹配
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer 布尔错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取元素
  #[error("无法获取元素: {0}")]
  ElementNotFound(&'static str),
  /// 无法转换元素为 appsrc
  #[error("无法将元素转换为 appsrc")]
  AppSrcConversionFailed,
  /// 管道错误
  #[error("管道错误: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("状态改变错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 推送缓冲区失败
  #[error("推送缓冲区失败: {0}")]
  FlowError(#[from] gst::FlowError),
  /// 缓冲区创建错误
  #[error("缓冲区创建错误")]
  BufferCreationError,
}

const FINISH_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(10);

/// GStreamer 视频文件输出
///
/// 管道：`appsrc (GRAY8) ! videoconvert ! 编码器 ! 封装器 ! filesink`
pub struct GStreamerVideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  video_info: gst_video::VideoInfo,
  path: PathBuf,
  fps: u32,
  frame_count: u64,
  finished: bool,
}

fn encoder_chain(path: &std::path::Path) -> &'static str {
  match path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| ext.to_ascii_lowercase())
    .as_deref()
  {
    Some("mkv") => "x264enc speed-preset=fast ! h264parse ! matroskamux",
    Some("avi") => "x264enc speed-preset=fast ! avimux",
    _ => "x264enc speed-preset=fast tune=zerolatency ! h264parse ! mp4mux",
  }
}

impl GStreamerVideoOutput {
  pub const SCHEME: &'static str = "file";

  pub fn open(url: &Url, width: u32, height: u32) -> Result<Self, OutputError> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerVideoOutputError::SchemeMismatch.into());
    }
    let fps = output_fps(url)?;
    Ok(Self::create(url_to_path(url), width, height, fps)?)
  }

  pub fn create(
    path: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
  ) -> Result<Self, GStreamerVideoOutputError> {
    if width == 0 || height == 0 {
      return Err(GStreamerVideoOutputError::PipelineError(format!(
        "输出尺寸无效: {}x{}",
        width, height
      )));
    }
    // 重复调用是安全的空操作
    gst::init()?;

    let description = format!(
      "appsrc name=src ! videoconvert ! video/x-raw,format=I420 ! {} ! filesink name=sink",
      encoder_chain(&path)
    );
    info!("创建视频输出管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerVideoOutputError::PipelineError("无法创建管道".to_string()))?;

    let filesink = pipeline
      .by_name("sink")
      .ok_or(GStreamerVideoOutputError::ElementNotFound("filesink"))?;
    filesink.set_property("location", path.to_string_lossy().as_ref());

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoOutputError::ElementNotFound("appsrc"))?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoOutputError::AppSrcConversionFailed)?;

    let video_info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Gray8, width, height)
      .fps(gst::Fraction::new(fps as i32, 1))
      .build()?;
    appsrc.set_caps(Some(&video_info.to_caps()?));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    info!(
      "视频输出已初始化: {}x{} @ {} fps -> {}",
      width,
      height,
      fps,
      path.display()
    );

    Ok(GStreamerVideoOutput {
      pipeline,
      appsrc,
      video_info,
      path,
      fps,
      frame_count: 0,
      finished: false,
    })
  }

  fn push_frame(&mut self, frame: &GrayImage) -> Result<(), GStreamerVideoOutputError> {
    let mut buffer = gst::Buffer::with_size(self.video_info.size())
      .map_err(|_| GStreamerVideoOutputError::BufferCreationError)?;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoOutputError::BufferCreationError)?;
      let frame_ns = 1_000_000_000 / self.fps as u64;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(self.frame_count * frame_ns));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_ns));

      let mut video_frame =
        gst_video::VideoFrameRef::from_buffer_ref_writable(buffer_ref, &self.video_info)?;
      let stride = video_frame.plane_stride()[0] as usize;
      let data = video_frame.plane_data_mut(0)?;
      let row = frame.width() as usize;

      // 按目标步长逐行拷贝
      for (y, line) in frame.as_raw().chunks_exact(row).enumerate() {
        data[y * stride..y * stride + row].copy_from_slice(line);
      }
    }

    self.appsrc.push_buffer(buffer)?;
    self.frame_count += 1;
    Ok(())
  }

  fn finalize(&mut self) -> Result<(), GStreamerVideoOutputError> {
    self.appsrc.end_of_stream()?;

    let bus = self
      .pipeline
      .bus()
      .ok_or_else(|| GStreamerVideoOutputError::PipelineError("管道没有总线".to_string()))?;
    let result = match bus.timed_pop_filtered(
      FINISH_TIMEOUT,
      &[gst::MessageType::Eos, gst::MessageType::Error],
    ) {
      Some(message) => match message.view() {
        gst::MessageView::Error(err) => Err(GStreamerVideoOutputError::PipelineError(format!(
          "{} ({})",
          err.error(),
          err.debug().map(|d| d.to_string()).unwrap_or_default()
        ))),
        _ => Ok(()),
      },
      None => Err(GStreamerVideoOutputError::PipelineError(
        "等待封装结束超时".to_string(),
      )),
    };

    self.pipeline.set_state(gst::State::Null)?;
    result
  }
}

impl FrameSink for GStreamerVideoOutput {
  fn width(&self) -> u32 {
    self.video_info.width()
  }

  fn height(&self) -> u32 {
    self.video_info.height()
  }

  fn fps(&self) -> u32 {
    self.fps
  }

  fn write(&mut self, frame: &GrayImage) -> Result<(), OutputError> {
    if self.finished {
      return Err(OutputError::Finished);
    }
    check_dimensions(frame, self.width(), self.height())?;
    self.push_frame(frame)?;
    Ok(())
  }

  fn finish(&mut self) -> Result<u64, OutputError> {
    if self.finished {
      return Ok(self.frame_count);
    }
    self.finished = true;
    self.finalize()?;
    info!(
      "视频输出已关闭: {}，共写入 {} 帧",
      self.path.display(),
      self.frame_count
    );
    Ok(self.frame_count)
  }

  fn frames_written(&self) -> u64 {
    self.frame_count
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    if !self.finished {
      self.finished = true;
      if let Err(e) = self.finalize() {
        warn!("关闭视频输出失败: {}", e);
      }
    }
  }
}
