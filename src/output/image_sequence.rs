// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/output/image_sequence.rs - 图片序列输出
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

//! 把灰度帧逐帧写为 PNG，收尾时写入 `index.json` 清单。
//!
//! URL 格式：`frames:///path/to/dir`，可选 `?fps=`（1 到 120，默认 20）。

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  output::{FrameSink, OutputError, check_dimensions, output_fps},
  url_to_path,
};

pub const MANIFEST_FILE: &str = "index.json";

#[derive(Error, Debug)]
pub enum ImageSequenceOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("输出尺寸无效: {0}x{1}")]
  InvalidDimensions(u32, u32),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("清单序列化错误: {0}")]
  ManifestError(#[from] serde_json::Error),
}

/// 图片序列清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceManifest {
  pub width: u32,
  pub height: u32,
  pub fps: f64,
  pub frames: u64,
  pub files: Vec<String>,
  pub created_at: String,
}

pub struct ImageSequenceOutput {
  directory: PathBuf,
  width: u32,
  height: u32,
  fps: u32,
  files: Vec<String>,
  finished: bool,
}

impl ImageSequenceOutput {
  pub const SCHEME: &'static str = "frames";

  pub fn open(url: &Url, width: u32, height: u32) -> Result<Self, OutputError> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageSequenceOutputError::SchemeMismatch.into());
    }
    let fps = output_fps(url)?;
    Ok(Self::create(url_to_path(url), width, height, fps)?)
  }

  pub fn create(
    directory: impl Into<PathBuf>,
    width: u32,
    height: u32,
    fps: u32,
  ) -> Result<Self, ImageSequenceOutputError> {
    if width == 0 || height == 0 {
      return Err(ImageSequenceOutputError::InvalidDimensions(width, height));
    }
    let directory = directory.into();
    fs::create_dir_all(&directory)?;
    info!(
      "图片序列输出: {} ({}x{} @ {} fps)",
      directory.display(),
      width,
      height,
      fps
    );

    Ok(Self {
      directory,
      width,
      height,
      fps,
      files: Vec::new(),
      finished: false,
    })
  }

  fn write_manifest(&self) -> Result<(), ImageSequenceOutputError> {
    let manifest = SequenceManifest {
      width: self.width,
      height: self.height,
      fps: self.fps as f64,
      frames: self.files.len() as u64,
      files: self.files.clone(),
      created_at: Utc::now().to_rfc3339(),
    };
    let data = serde_json::to_vec_pretty(&manifest)?;
    fs::write(self.directory.join(MANIFEST_FILE), data)?;
    Ok(())
  }
}

impl FrameSink for ImageSequenceOutput {
  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> u32 {
    self.fps
  }

  fn write(&mut self, frame: &GrayImage) -> Result<(), OutputError> {
    if self.finished {
      return Err(OutputError::Finished);
    }
    check_dimensions(frame, self.width, self.height)?;

    let name = format!("frame_{:06}.png", self.files.len());
    frame
      .save(self.directory.join(&name))
      .map_err(ImageSequenceOutputError::from)?;
    self.files.push(name);
    Ok(())
  }

  fn finish(&mut self) -> Result<u64, OutputError> {
    if self.finished {
      return Ok(self.files.len() as u64);
    }
    self.finished = true;
    self.write_manifest()?;
    info!(
      "图片序列输出完成: {}，共 {} 帧",
      self.directory.display(),
      self.files.len()
    );
    Ok(self.files.len() as u64)
  }

  fn frames_written(&self) -> u64 {
    self.files.len() as u64
  }
}

impl Drop for ImageSequenceOutput {
  fn drop(&mut self) {
    if !self.finished {
      if let Err(e) = self.finish() {
        warn!("关闭图片序列输出失败: {}", e);
      }
    }
  }
}
