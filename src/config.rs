// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/config.rs - 运行配置解析与校验
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

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{model::class_id_of, url_to_path, worker::StreamJob};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("没有配置任何视频流")]
  NoFeeds,
  #[error("输入数量 ({inputs}) 与输出数量 ({outputs}) 不一致")]
  FeedCountMismatch { inputs: usize, outputs: usize },
  #[error("无效的地址 {value}: {reason}")]
  InvalidLocator { value: String, reason: String },
  #[error("置信度阈值必须在 0 到 1 之间: {0}")]
  InvalidConfidence(f32),
  #[error("未知的类别: {0}")]
  UnknownClass(String),
  #[error("无效的时长: {0}")]
  InvalidDuration(f64),
  #[error("读取配置文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置文件格式错误: {0}")]
  Json(#[from] serde_json::Error),
}

/// 流列表文件中的一项
///
/// ```json
/// [
///   { "input": "rtsp://cam-1/stream", "output": "/data/cam-1.mp4", "duration_secs": 60 },
///   { "input": "/data/clip.mp4", "output": "frames:///data/clip-gray" }
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedEntry {
  pub input: String,
  pub output: String,
  #[serde(default)]
  pub duration_secs: Option<f64>,
}

pub fn load_feed_file(path: &Path) -> Result<Vec<FeedEntry>, ConfigError> {
  let data = fs::read(path)?;
  let entries: Vec<FeedEntry> = serde_json::from_slice(&data)?;
  debug!("从 {} 读取 {} 路流", path.display(), entries.len());
  Ok(entries)
}

fn path_to_url(value: &str) -> Result<Url, ConfigError> {
  let path = PathBuf::from(value);
  let absolute = if path.is_absolute() {
    path
  } else {
    std::env::current_dir()?.join(path)
  };
  Url::from_file_path(&absolute).map_err(|_| ConfigError::InvalidLocator {
    value: value.to_string(),
    reason: "无法转换为 file:// 地址".to_string(),
  })
}

/// 解析输入/输出地址；不带方案的本地路径转换为 `file://`
pub fn parse_locator(value: &str) -> Result<Url, ConfigError> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ConfigError::InvalidLocator {
      value: value.to_string(),
      reason: "地址为空".to_string(),
    });
  }

  match Url::parse(value) {
    // 单字母方案是 Windows 盘符
    Ok(url) if url.scheme().len() > 1 => Ok(url),
    Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => path_to_url(value),
    Err(e) => Err(ConfigError::InvalidLocator {
      value: value.to_string(),
      reason: e.to_string(),
    }),
  }
}

pub fn parse_class(value: &str) -> Result<u32, ConfigError> {
  class_id_of(value).ok_or_else(|| ConfigError::UnknownClass(value.to_string()))
}

pub fn validate_confidence(value: f32) -> Result<f32, ConfigError> {
  if value.is_finite() && (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(ConfigError::InvalidConfidence(value))
  }
}

pub fn duration_from_secs(secs: f64) -> Result<Duration, ConfigError> {
  match Duration::try_from_secs_f64(secs) {
    Ok(duration) if !duration.is_zero() => Ok(duration),
    _ => Err(ConfigError::InvalidDuration(secs)),
  }
}

/// 合并命令行中的输入输出对与流列表文件，生成任务列表
///
/// 命令行中的流排在前面；流列表中单独配置的时长优先于全局时长。
pub fn build_jobs(
  inputs: &[String],
  outputs: &[String],
  feed_file: Option<&Path>,
  duration_secs: Option<f64>,
) -> Result<Vec<StreamJob>, ConfigError> {
  if inputs.len() != outputs.len() {
    return Err(ConfigError::FeedCountMismatch {
      inputs: inputs.len(),
      outputs: outputs.len(),
    });
  }

  let default_duration = duration_secs.map(duration_from_secs).transpose()?;

  let mut jobs = Vec::new();
  for (input, output) in inputs.iter().zip(outputs) {
    jobs.push(StreamJob::new(
      parse_locator(input)?,
      parse_locator(output)?,
      default_duration,
    ));
  }

  if let Some(path) = feed_file {
    for entry in load_feed_file(path)? {
      let duration = match entry.duration_secs {
        Some(secs) => Some(duration_from_secs(secs)?),
        None => default_duration,
      };
      jobs.push(StreamJob::new(
        parse_locator(&entry.input)?,
        parse_locator(&entry.output)?,
        duration,
      ));
    }
  }

  if jobs.is_empty() {
    return Err(ConfigError::NoFeeds);
  }
  Ok(jobs)
}

/// 为 `file://` 输出预先创建上级目录
pub fn ensure_output_dirs(jobs: &[StreamJob]) -> Result<(), ConfigError> {
  for job in jobs {
    if job.output.scheme() != "file" {
      continue;
    }
    let path = url_to_path(&job.output);
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() && !parent.exists() {
        debug!("创建输出目录: {}", parent.display());
        fs::create_dir_all(parent)?;
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn locators_keep_their_scheme() {
    let url = parse_locator("rtsp://10.0.0.2:8554/cam").unwrap();
    assert_eq!(url.scheme(), "rtsp");
    let url = parse_locator("frames:///data/out?fps=25").unwrap();
    assert_eq!(url.scheme(), "frames");
  }

  #[test]
  fn bare_paths_become_file_urls() {
    let url = parse_locator("/data/my clip.mp4").unwrap();
    assert_eq!(url.scheme(), "file");
    assert_eq!(url_to_path(&url), PathBuf::from("/data/my clip.mp4"));

    let url = parse_locator("clips/a.mp4").unwrap();
    assert_eq!(url.scheme(), "file");
    assert!(url_to_path(&url).is_absolute());
    assert!(url.path().ends_with("/clips/a.mp4"));
  }

  #[test]
  fn empty_locator_is_rejected() {
    assert!(matches!(
      parse_locator("  "),
      Err(ConfigError::InvalidLocator { .. })
    ));
  }

  #[test]
  fn classes_and_thresholds_are_validated() {
    assert_eq!(parse_class("person").unwrap(), 0);
    assert!(matches!(
      parse_class("dragon"),
      Err(ConfigError::UnknownClass(_))
    ));
    assert!(validate_confidence(0.5).is_ok());
    assert!(validate_confidence(1.5).is_err());
    assert!(validate_confidence(f32::NAN).is_err());
  }

  #[test]
  fn durations_must_be_positive() {
    assert_eq!(duration_from_secs(2.0).unwrap(), Duration::from_secs(2));
    assert!(duration_from_secs(0.0).is_err());
    assert!(duration_from_secs(-1.0).is_err());
    assert!(duration_from_secs(f64::NAN).is_err());
  }

  #[test]
  fn mismatched_pairs_are_rejected() {
    let inputs = vec!["pattern://".to_string(), "pattern://".to_string()];
    let outputs = vec!["frames:///tmp/a".to_string()];
    assert!(matches!(
      build_jobs(&inputs, &outputs, None, None),
      Err(ConfigError::FeedCountMismatch {
        inputs: 2,
        outputs: 1
      })
    ));
    assert!(matches!(
      build_jobs(&[], &[], None, None),
      Err(ConfigError::NoFeeds)
    ));
  }

  #[test]
  fn feed_file_entries_follow_command_line_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let feeds = dir.path().join("feeds.json");
    fs::write(
      &feeds,
      r#"[
        { "input": "pattern://?frames=3", "output": "frames:///tmp/b", "duration_secs": 5 },
        { "input": "pattern://?frames=4", "output": "frames:///tmp/c" }
      ]"#,
    )
    .unwrap();

    let jobs = build_jobs(
      &["pattern://?frames=2".to_string()],
      &["frames:///tmp/a".to_string()],
      Some(&feeds),
      Some(1.0),
    )
    .unwrap();

    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0].output.path(), "/tmp/a");
    assert_eq!(jobs[0].duration, Some(Duration::from_secs(1)));
    assert_eq!(jobs[1].duration, Some(Duration::from_secs(5)));
    assert_eq!(jobs[2].duration, Some(Duration::from_secs(1)));
    assert_eq!(jobs[2].input.query(), Some("frames=4"));
  }

  #[test]
  fn malformed_feed_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let feeds = dir.path().join("feeds.json");
    fs::write(&feeds, r#"[{ "input": "pattern://", "sink": "x" }]"#).unwrap();
    assert!(matches!(
      build_jobs(&[], &[], Some(&feeds), None),
      Err(ConfigError::Json(_))
    ));
    assert!(matches!(
      build_jobs(&[], &[], Some(&dir.path().join("missing.json")), None),
      Err(ConfigError::Io(_))
    ));
  }

  #[test]
  fn output_parents_are_created_for_files_only() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("nested/deeper/out.mp4");
    let frames = dir.path().join("frames-out/sub");
    let jobs = vec![
      StreamJob::new(
        parse_locator("pattern://").unwrap(),
        parse_locator(video.to_str().unwrap()).unwrap(),
        None,
      ),
      StreamJob::new(
        parse_locator("pattern://").unwrap(),
        Url::parse(&format!("frames://{}", frames.display())).unwrap(),
        None,
      ),
    ];

    ensure_output_dirs(&jobs).unwrap();
    assert!(dir.path().join("nested/deeper").is_dir());
    assert!(!video.exists());
    assert!(!dir.path().join("frames-out").exists());
  }
}
