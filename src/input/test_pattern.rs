// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/input/test_pattern.rs - 合成测试图案输入
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

//! 合成的滚动渐变图案，不依赖任何外部文件或设备。
//!
//! # URL 格式
//!
//! `pattern://?width=320&height=240&fps=20&frames=100&live=true`
//!
//! - `width`、`height`：帧尺寸，默认 320x240
//! - `fps`：声明帧率，默认 20
//! - `frames`：总帧数，缺省时无限产生
//! - `live`：为 `true` 时按声明帧率节流，模拟实时摄像头

use std::thread;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, timestamp_for},
  input::{FrameSource, InputError, InputSourceType},
  query_map,
};

#[derive(Error, Debug)]
pub enum TestPatternInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数 {name} 无效: {value}")]
  InvalidParameter { name: &'static str, value: String },
}

const TEST_PATTERN_SCHEME: &str = "pattern";
const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;
const DEFAULT_FPS: f64 = 20.0;

#[derive(Debug)]
pub struct TestPatternInput {
  width: u32,
  height: u32,
  fps: f64,
  frames: Option<u64>,
  live: bool,
  index: u64,
  started: Option<Instant>,
}

impl TestPatternInput {
  pub fn new(width: u32, height: u32, fps: f64, frames: Option<u64>) -> Self {
    Self {
      width,
      height,
      fps,
      frames,
      live: false,
      index: 0,
      started: None,
    }
  }

  pub fn live(mut self, live: bool) -> Self {
    self.live = live;
    self
  }

  /// 生成第 `index` 帧：红色通道随帧号水平滚动，绿色通道为垂直渐变
  pub fn render(&self, index: u64) -> RgbImage {
    let (w, h) = (self.width as u64, self.height as u64);
    RgbImage::from_fn(self.width, self.height, |x, y| {
      let r = ((x as u64 + index) % w) * 255 / w;
      let g = y as u64 * 255 / h;
      let b = index * 8 % 256;
      Rgb([r as u8, g as u8, b as u8])
    })
  }

  fn pace(&mut self, index: u64) {
    let started = *self.started.get_or_insert_with(Instant::now);
    let due = started + Duration::from_secs_f64(index as f64 / self.fps);
    let now = Instant::now();
    if due > now {
      thread::sleep(due - now);
    }
  }
}

fn parse_param<T: std::str::FromStr>(
  value: Option<&String>,
  name: &'static str,
  default: T,
  valid: impl Fn(&T) -> bool,
) -> Result<T, TestPatternInputError> {
  match value {
    None => Ok(default),
    Some(value) => value
      .parse::<T>()
      .ok()
      .filter(|v| valid(v))
      .ok_or_else(|| TestPatternInputError::InvalidParameter {
        name,
        value: value.clone(),
      }),
  }
}

impl FromUrlWithScheme for TestPatternInput {
  const SCHEME: &'static str = TEST_PATTERN_SCHEME;
}

impl FromUrl for TestPatternInput {
  type Error = TestPatternInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TestPatternInputError::SchemeMismatch);
    }

    let query = query_map(url);
    let width = parse_param(query.get("width"), "width", DEFAULT_WIDTH, |w| *w > 0)?;
    let height = parse_param(query.get("height"), "height", DEFAULT_HEIGHT, |h| *h > 0)?;
    let fps = parse_param(query.get("fps"), "fps", DEFAULT_FPS, |f: &f64| {
      f.is_finite() && *f > 0.0
    })?;
    let frames = match query.get("frames") {
      Some(_) => Some(parse_param(query.get("frames"), "frames", 0u64, |_| true)?),
      None => None,
    };
    let live = parse_param(query.get("live"), "live", false, |_| true)?;

    Ok(TestPatternInput::new(width, height, fps, frames).live(live))
  }
}

impl Iterator for TestPatternInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(total) = self.frames {
      if self.index >= total {
        return None;
      }
    }

    let index = self.index;
    self.index += 1;
    if self.live {
      self.pace(index);
    }
    let image = self.render(index);
    Some(Ok(Frame::new(
      image,
      index,
      timestamp_for(index, Some(self.fps)),
    )))
  }
}

impl FrameSource for TestPatternInput {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::TestPattern
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    Some(self.fps)
  }
}
