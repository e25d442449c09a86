// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
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

//! # GStreamer 视频输入模块
//!
//! 通过 `uridecodebin` 解码视频文件或网络流，统一转换为 RGB 帧。
//!
//! ## 系统依赖
//!
//! 使用前需要安装 GStreamer 开发库：
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! **macOS:**
//! ```bash
//! brew install gstreamer
//! ```
//!
//! ## 支持的 URL
//!
//! - `file:///path/to/video.mp4`
//! - `rtsp://host:8554/stream`、`rtsps://...`
//! - `http://...`、`https://...`
//!
//! ## 基本用法
//!
//! ```no_run
//! use duolu::{FromUrl, input::GStreamerInput};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("file:///data/clip.mp4")?;
//! let input = GStreamerInput::from_url(&url)?;
//!
//! for frame in input {
//!     let frame = frame?;
//!     println!("处理帧: {}x{}", frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl,
  frame::{Frame, timestamp_for},
  input::{FrameSource, InputError, InputSourceType},
  url_to_path,
};

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不被支持
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  /// 本地视频文件不存在
  #[error("视频文件不存在: {0}")]
  FileNotFound(PathBuf),
  /// GStreamer 库错误
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer 布尔错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("无法获取 appsink 元素")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("无法将元素转换为 appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  /// 管道错误
  #[error("管道错误: {0}")]
  PipelineError(String),
  /// 流中途出错
  #[error("视频流错误: {0}")]
  StreamError(String),
  /// 分辨率在流中途发生变化
  #[error("帧尺寸 {actual:?} 与流尺寸 {expected:?} 不一致")]
  DimensionMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  /// 状态改变错误
  #[error("状态改变错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

const SUPPORTED_SCHEMES: [&str; 5] = ["file", "rtsp", "rtsps", "http", "https"];
const PULL_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(10);

/// GStreamer 视频输入
///
/// 打开时启动管道并拉取首帧，以便在读取任何帧之前就确定尺寸与帧率。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  pending: Option<gst::Sample>,
  width: u32,
  height: u32,
  fps: Option<f64>,
  index: u64,
  finished: bool,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("无法停止 GStreamer 管道: {}", e);
    }
  }
}

impl GStreamerInput {
  pub fn accepts(scheme: &str) -> bool {
    SUPPORTED_SCHEMES.contains(&scheme)
  }

  pub fn open(url: &Url) -> Result<Self, GStreamerInputError> {
    if url.scheme() == "file" {
      let path = url_to_path(url);
      if !path.is_file() {
        return Err(GStreamerInputError::FileNotFound(path));
      }
    }
    gst::init()?;

    let description = format!(
      "uridecodebin uri=\"{}\" ! videoconvert ! video/x-raw,format=RGB ! \
       appsink name=sink sync=false max-buffers=8",
      url.as_str()
    );
    info!("GStreamer 管道描述: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("无法创建管道".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    let mut input = GStreamerInput {
      pipeline,
      appsink,
      pending: None,
      width: 0,
      height: 0,
      fps: None,
      index: 0,
      finished: false,
    };

    // 之后的任何失败都会经由 Drop 把管道置回 Null
    input.pipeline.set_state(gst::State::Playing)?;
    let (result, _, _) = input.pipeline.state(PULL_TIMEOUT);
    if let Err(e) = result {
      let message = input.bus_error().unwrap_or_else(|| e.to_string());
      return Err(GStreamerInputError::PipelineError(message));
    }

    let sample = input.appsink.try_pull_sample(PULL_TIMEOUT).ok_or_else(|| {
      GStreamerInputError::StreamError(
        input
          .bus_error()
          .unwrap_or_else(|| "未收到任何帧".to_string()),
      )
    })?;

    let caps = sample
      .caps()
      .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有 caps".to_string()))?;
    let video_info =
      gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

    input.width = video_info.width();
    input.height = video_info.height();
    let fps = video_info.fps();
    input.fps = if fps.numer() > 0 && fps.denom() > 0 {
      Some(fps.numer() as f64 / fps.denom() as f64)
    } else {
      None
    };
    input.pending = Some(sample);

    debug!(
      "GStreamer 输入就绪: {}x{}, 帧率 {:?}",
      input.width, input.height, input.fps
    );
    Ok(input)
  }

  fn bus_error(&self) -> Option<String> {
    let bus = self.pipeline.bus()?;
    let message = bus.pop_filtered(&[gst::MessageType::Error])?;
    match message.view() {
      gst::MessageView::Error(err) => Some(format!(
        "{} ({})",
        err.error(),
        err
          .debug()
          .map(|d| d.to_string())
          .unwrap_or_default()
      )),
      _ => None,
    }
  }

  fn pull_sample(&mut self) -> Result<Option<gst::Sample>, GStreamerInputError> {
    if let Some(sample) = self.pending.take() {
      return Ok(Some(sample));
    }
    match self.appsink.try_pull_sample(PULL_TIMEOUT) {
      Some(sample) => Ok(Some(sample)),
      None if self.appsink.is_eos() => Ok(None),
      None => Err(GStreamerInputError::StreamError(
        self
          .bus_error()
          .unwrap_or_else(|| "拉取帧超时".to_string()),
      )),
    }
  }

  fn convert_sample(&self, sample: &gst::Sample) -> Result<RgbImage, GStreamerInputError> {
    let buffer = sample
      .buffer()
      .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有缓冲区".to_string()))?;
    let caps = sample
      .caps()
      .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有 caps".to_string()))?;
    let video_info =
      gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

    let actual = (video_info.width(), video_info.height());
    if actual != (self.width, self.height) {
      return Err(GStreamerInputError::DimensionMismatch {
        expected: (self.width, self.height),
        actual,
      });
    }

    let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &video_info)?;
    let data = frame.plane_data(0)?;
    let stride = frame.plane_stride()[0] as usize;
    let row = self.width as usize * 3;

    // 按步长逐行拷贝，去掉行尾对齐填充
    let mut pixels = Vec::with_capacity(row * self.height as usize);
    for y in 0..self.height as usize {
      let start = y * stride;
      let line = data.get(start..start + row).ok_or_else(|| {
        GStreamerInputError::PipelineError(format!("缓冲区过小: 第 {} 行越界", y))
      })?;
      pixels.extend_from_slice(line);
    }

    RgbImage::from_raw(self.width, self.height, pixels)
      .ok_or_else(|| GStreamerInputError::PipelineError("无法创建 RGB 图像".to_string()))
  }
}

impl FromUrl for GStreamerInput {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !Self::accepts(url.scheme()) {
      return Err(GStreamerInputError::SchemeMismatch(
        url.scheme().to_string(),
      ));
    }
    Self::open(url)
  }
}

impl Iterator for GStreamerInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }

    let result = self.pull_sample().and_then(|sample| match sample {
      Some(sample) => self.convert_sample(&sample).map(Some),
      None => Ok(None),
    });

    match result {
      Ok(Some(image)) => {
        let index = self.index;
        self.index += 1;
        Some(Ok(Frame::new(image, index, timestamp_for(index, self.fps))))
      }
      Ok(None) => {
        self.finished = true;
        None
      }
      Err(e) => {
        self.finished = true;
        Some(Err(e.into()))
      }
    }
  }
}

impl FrameSource for GStreamerInput {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::Stream
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }
}
