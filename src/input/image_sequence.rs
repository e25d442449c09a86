// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/input/image_sequence.rs - 图片序列输入
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

//! 以目录中的图片文件作为视频帧。
//!
//! # URL 格式
//!
//! - `frames:///path/to/dir` - 读取目录中的 png/jpg/jpeg 文件，按文件名排序
//! - `frames:///path/to/dir?fps=25` - 指定声明帧率
//!
//! 未指定 `fps` 时，若目录中存在 `index.json`（由图片序列输出写入），则使用其中记录的帧率。

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, timestamp_for},
  input::{FrameSource, InputError, InputSourceType},
  output::{MANIFEST_FILE, SequenceManifest},
  query_map, url_to_path,
};

#[derive(Error, Debug)]
pub enum ImageSequenceInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("不是目录: {0}")]
  NotADirectory(PathBuf),
  #[error("目录中没有图片: {0}")]
  EmptyDirectory(PathBuf),
  #[error("帧率参数无效: {0}")]
  InvalidFps(String),
  #[error("IO 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图片解码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("第 {index} 帧尺寸 {actual:?} 与首帧 {expected:?} 不一致")]
  DimensionMismatch {
    index: u64,
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

const IMAGE_SEQUENCE_SCHEME: &str = "frames";
const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct ImageSequenceInput {
  files: Vec<PathBuf>,
  cursor: usize,
  pending: Option<RgbImage>,
  width: u32,
  height: u32,
  fps: Option<f64>,
}

impl ImageSequenceInput {
  pub fn open(dir: impl AsRef<Path>, fps: Option<f64>) -> Result<Self, ImageSequenceInputError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
      return Err(ImageSequenceInputError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
      let path = entry?.path();
      let is_frame = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if is_frame && path.is_file() {
        files.push(path);
      }
    }
    files.sort();

    let first = files
      .first()
      .ok_or_else(|| ImageSequenceInputError::EmptyDirectory(dir.to_path_buf()))?;
    let image = image::open(first)?.to_rgb8();
    let (width, height) = image.dimensions();

    let fps = fps.or_else(|| Self::manifest_fps(dir));
    debug!(
      "图片序列 {}: {} 帧, {}x{}, 帧率 {:?}",
      dir.display(),
      files.len(),
      width,
      height,
      fps
    );

    Ok(Self {
      files,
      cursor: 0,
      pending: Some(image),
      width,
      height,
      fps,
    })
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  fn manifest_fps(dir: &Path) -> Option<f64> {
    let path = dir.join(MANIFEST_FILE);
    let data = fs::read(&path).ok()?;
    match serde_json::from_slice::<SequenceManifest>(&data) {
      Ok(manifest) => Some(manifest.fps),
      Err(e) => {
        warn!("忽略无法解析的清单 {}: {}", path.display(), e);
        None
      }
    }
  }

  fn read_frame(&mut self, index: usize) -> Result<RgbImage, ImageSequenceInputError> {
    let image = match self.pending.take() {
      Some(image) => image,
      None => image::open(&self.files[index])?.to_rgb8(),
    };
    if image.dimensions() != (self.width, self.height) {
      return Err(ImageSequenceInputError::DimensionMismatch {
        index: index as u64,
        expected: (self.width, self.height),
        actual: image.dimensions(),
      });
    }
    Ok(image)
  }
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = IMAGE_SEQUENCE_SCHEME;
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageSequenceInputError::SchemeMismatch);
    }

    let fps = match query_map(url).get("fps") {
      Some(value) => Some(
        value
          .parse::<f64>()
          .ok()
          .filter(|fps| fps.is_finite() && *fps > 0.0)
          .ok_or_else(|| ImageSequenceInputError::InvalidFps(value.clone()))?,
      ),
      None => None,
    };

    Self::open(url_to_path(url), fps)
  }
}

impl Iterator for ImageSequenceInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.cursor >= self.files.len() {
      return None;
    }

    let index = self.cursor;
    self.cursor += 1;
    let frame = self.read_frame(index).map(|image| {
      Frame::new(image, index as u64, timestamp_for(index as u64, self.fps))
    });
    if frame.is_err() {
      // 读取失败后不再继续
      self.cursor = self.files.len();
    }
    Some(frame.map_err(InputError::from))
  }
}

impl FrameSource for ImageSequenceInput {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::ImageSequence
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

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn write_frames(dir: &Path, count: usize, size: (u32, u32)) {
    for i in 0..count {
      let image = RgbImage::from_pixel(size.0, size.1, Rgb([i as u8, 0, 0]));
      image.save(dir.join(format!("frame_{:03}.png", i))).unwrap();
    }
  }

  #[test]
  fn frames_are_read_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), 3, (8, 6));
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let url = Url::parse(&format!("frames://{}?fps=10", dir.path().display())).unwrap();
    let input = ImageSequenceInput::from_url(&url).unwrap();
    assert_eq!(input.len(), 3);
    assert_eq!((input.width(), input.height()), (8, 6));
    assert_eq!(input.fps(), Some(10.0));

    let frames: Vec<Frame> = input.map(Result::unwrap).collect();
    let reds: Vec<u8> = frames.iter().map(|f| f.image.get_pixel(0, 0)[0]).collect();
    assert_eq!(reds, vec![0, 1, 2]);
    assert_eq!(frames[2].index, 2);
    assert_eq!(frames[2].timestamp_ms, 200);
  }

  #[test]
  fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ImageSequenceInput::open(dir.path(), None),
      Err(ImageSequenceInputError::EmptyDirectory(_))
    ));
  }

  #[test]
  fn mismatched_frame_ends_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), 1, (8, 6));
    RgbImage::new(4, 4)
      .save(dir.path().join("frame_001.png"))
      .unwrap();

    let mut input = ImageSequenceInput::open(dir.path(), None).unwrap();
    assert!(input.next().unwrap().is_ok());
    assert!(matches!(
      input.next(),
      Some(Err(InputError::ImageSequenceInputError(
        ImageSequenceInputError::DimensionMismatch { index: 1, .. }
      )))
    ));
    assert!(input.next().is_none());
  }

  #[test]
  fn manifest_supplies_missing_fps() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), 2, (4, 4));
    let manifest = SequenceManifest {
      width: 4,
      height: 4,
      fps: 20.0,
      frames: 2,
      files: vec!["frame_000.png".into(), "frame_001.png".into()],
      created_at: "2026-01-01T00:00:00+00:00".into(),
    };
    fs::write(
      dir.path().join(MANIFEST_FILE),
      serde_json::to_vec(&manifest).unwrap(),
    )
    .unwrap();

    let input = ImageSequenceInput::open(dir.path(), None).unwrap();
    assert_eq!(input.fps(), Some(20.0));
  }
}
