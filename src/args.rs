// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use url::Url;

use duolu::{config, filter::DetectionPolicy};

/// Duolu 多路灰影：多路视频人员检测与灰度转码
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 并行处理多路视频流
  Run(RunArgs),
  /// 处理单路视频流（由 run 在独立进程中调用）
  #[command(hide = true)]
  Worker(WorkerArgs),
}

/// 工作单元的隔离方式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
  /// 每路流一个子进程
  Process,
  /// 每路流一个线程，共享一个推理服务
  Thread,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ModelArgs {
  /// 检测模型地址
  /// 支持格式:
  /// - ONNX SSD: ssd:///path/to/model.onnx?size=300
  /// - 固定结果: static://?det=y1,x1,y2,x2,person,0.9
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD", value_parser = parse_confidence)]
  pub confidence: f32,

  /// 目标类别（COCO 名称或编号）
  #[arg(long, default_value = "person", value_name = "CLASS", value_parser = parse_target_class)]
  pub target_class: u32,
}

impl ModelArgs {
  pub fn policy(&self) -> DetectionPolicy {
    DetectionPolicy::new(self.target_class, self.confidence)
  }

  /// 转发给子进程的参数
  pub fn forward(&self) -> Vec<OsString> {
    vec![
      "--model".into(),
      self.model.as_str().into(),
      "--confidence".into(),
      self.confidence.to_string().into(),
      "--target-class".into(),
      self.target_class.to_string().into(),
    ]
  }
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
  #[command(flatten)]
  pub model: ModelArgs,

  /// 输入来源，可重复，与 --output 按顺序配对
  /// 支持格式:
  /// - 视频文件: /path/to/video.mp4 或 file:///path/to/video.mp4
  /// - 网络流: rtsp://host/stream, http(s)://host/video.mp4
  /// - 图片序列: frames:///path/to/dir
  /// - 测试图案: pattern://?width=320&height=240&frames=100
  #[arg(long, value_name = "SOURCE")]
  pub input: Vec<String>,

  /// 输出地址，可重复
  /// 支持格式:
  /// - 视频文件: *.mp4, *.mkv, *.avi
  /// - 图片序列: frames:///path/to/dir
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<String>,

  /// 流列表文件（JSON 数组）
  #[arg(long, value_name = "FILE")]
  pub feeds: Option<PathBuf>,

  /// 每路流最长处理时间（秒）
  #[arg(long, value_name = "SECONDS")]
  pub duration: Option<f64>,

  /// 工作单元隔离方式
  #[arg(long, value_enum, default_value_t = Isolation::Process)]
  pub isolation: Isolation,

  /// 任一路失败时以非零状态退出
  #[arg(long)]
  pub fail_on_error: bool,
}

#[derive(ClapArgs, Debug)]
pub struct WorkerArgs {
  #[command(flatten)]
  pub model: ModelArgs,

  #[arg(long, value_name = "SOURCE")]
  pub input: String,

  #[arg(long, value_name = "OUTPUT")]
  pub output: String,

  #[arg(long, value_name = "SECONDS")]
  pub duration: Option<f64>,
}

fn parse_confidence(value: &str) -> Result<f32, String> {
  let value: f32 = value.parse().map_err(|e| format!("{}", e))?;
  config::validate_confidence(value).map_err(|e| e.to_string())
}

fn parse_target_class(value: &str) -> Result<u32, String> {
  config::parse_class(value).map_err(|e| e.to_string())
}
