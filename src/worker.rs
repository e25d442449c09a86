// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/worker.rs - 单路视频流处理
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

//! 单路流水线：解码 → 检测 → 筛选 → 绘制 → 灰度 → 编码。
//!
//! 状态流转：
//!
//! ```text
//! Opening ──打开失败──▶ Errored
//!    │
//!    ▼
//! Running ──帧处理失败──▶ Errored（输出仍会收尾）
//!    │ 流结束 / 读取失败 / 时长耗尽
//!    ▼
//! Draining ──▶ Closed
//! ```

use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn};
use url::Url;

use crate::{
  FromUrl,
  filter::DetectionPolicy,
  frame::Frame,
  input::{FrameSource, InputError, InputWrapper},
  model::{DetectResult, Model},
  output::{FrameSink, OutputError, OutputWrapper, draw::annotate, gray::to_grayscale},
};

/// 一路流的处理任务，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamJob {
  pub input: Url,
  pub output: Url,
  /// `None` 表示处理到流结束
  pub duration: Option<Duration>,
}

impl StreamJob {
  pub fn new(input: Url, output: Url, duration: Option<Duration>) -> Self {
    Self {
      input,
      output,
      duration,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Opening,
  Running,
  Draining,
  Closed,
  Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  SourceOpen,
  SinkOpen,
  ModelLoad,
  Detect,
  Transform,
  Write,
  Finalize,
  /// 同一个工作器被重复运行
  Spent,
}

impl FailureKind {
  const ALL: [FailureKind; 8] = [
    FailureKind::SourceOpen,
    FailureKind::SinkOpen,
    FailureKind::ModelLoad,
    FailureKind::Detect,
    FailureKind::Transform,
    FailureKind::Write,
    FailureKind::Finalize,
    FailureKind::Spent,
  ];

  /// 子进程退出码，从 10 开始依次编号
  pub fn exit_code(self) -> i32 {
    10 + self as i32
  }

  pub fn from_exit_code(code: i32) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.exit_code() == code)
  }
}

impl Display for FailureKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      FailureKind::SourceOpen => "打开输入失败",
      FailureKind::SinkOpen => "打开输出失败",
      FailureKind::ModelLoad => "加载模型失败",
      FailureKind::Detect => "检测失败",
      FailureKind::Transform => "帧转换失败",
      FailureKind::Write => "写入输出失败",
      FailureKind::Finalize => "输出收尾失败",
      FailureKind::Spent => "工作器已运行过",
    };
    f.write_str(text)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
  EndOfStream,
  /// 读取失败，按流结束处理
  ReadError,
  DurationExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerOutcome {
  Completed {
    frames: u64,
    reason: StopReason,
  },
  Failed {
    kind: FailureKind,
    frames: u64,
    message: String,
  },
  /// 工作单元没有汇报结果就退出了
  Crashed {
    message: String,
  },
}

impl WorkerOutcome {
  pub fn failed(kind: FailureKind, frames: u64, message: impl Into<String>) -> Self {
    WorkerOutcome::Failed {
      kind,
      frames,
      message: message.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, WorkerOutcome::Completed { .. })
  }

  pub fn frames(&self) -> u64 {
    match self {
      WorkerOutcome::Completed { frames, .. } | WorkerOutcome::Failed { frames, .. } => *frames,
      WorkerOutcome::Crashed { .. } => 0,
    }
  }

  pub fn exit_code(&self) -> i32 {
    match self {
      WorkerOutcome::Completed { .. } => 0,
      WorkerOutcome::Failed { kind, .. } => kind.exit_code(),
      WorkerOutcome::Crashed { .. } => 1,
    }
  }
}

impl Display for WorkerOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WorkerOutcome::Completed { frames, reason } => {
        write!(f, "完成 {} 帧 ({:?})", frames, reason)
      }
      WorkerOutcome::Failed {
        kind,
        frames,
        message,
      } => write!(f, "{}（已处理 {} 帧）: {}", kind, frames, message),
      WorkerOutcome::Crashed { message } => write!(f, "异常退出: {}", message),
    }
  }
}

/// 媒体打开方式，工作器通过它获得输入源与输出
pub trait MediaIo {
  type Source: FrameSource;
  type Sink: FrameSink;

  fn open_source(&self, url: &Url) -> Result<Self::Source, InputError>;

  fn open_sink(&self, url: &Url, width: u32, height: u32) -> Result<Self::Sink, OutputError>;
}

/// 按 URI 方案分派到各个输入输出后端
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlMediaIo;

impl MediaIo for UrlMediaIo {
  type Source = InputWrapper;
  type Sink = OutputWrapper;

  fn open_source(&self, url: &Url) -> Result<Self::Source, InputError> {
    InputWrapper::from_url(url)
  }

  fn open_sink(&self, url: &Url, width: u32, height: u32) -> Result<Self::Sink, OutputError> {
    OutputWrapper::open(url, width, height)
  }
}

struct StageFailure {
  kind: FailureKind,
  message: String,
}

impl StageFailure {
  fn new(kind: FailureKind, err: impl Display) -> Self {
    Self {
      kind,
      message: err.to_string(),
    }
  }
}

pub struct StreamWorker<I = UrlMediaIo> {
  job: StreamJob,
  policy: DetectionPolicy,
  io: I,
  state: WorkerState,
}

impl StreamWorker<UrlMediaIo> {
  pub fn new(job: StreamJob, policy: DetectionPolicy) -> Self {
    Self::with_io(job, policy, UrlMediaIo)
  }
}

impl<I: MediaIo> StreamWorker<I> {
  pub fn with_io(job: StreamJob, policy: DetectionPolicy, io: I) -> Self {
    Self {
      job,
      policy,
      io,
      state: WorkerState::Opening,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  /// 处理整路流直到结束、出错或时长耗尽；阻塞调用，每个工作器只能运行一次
  pub fn run<M>(&mut self, model: &M) -> WorkerOutcome
  where
    M: Model<Input = RgbImage, Output = DetectResult>,
    M::Error: Display,
  {
    let span = info_span!("stream", input = %self.job.input);
    let _enter = span.enter();

    if self.state != WorkerState::Opening {
      warn!("工作器已处于 {:?} 状态，拒绝再次运行", self.state);
      return WorkerOutcome::failed(FailureKind::Spent, 0, "工作器不可重复运行");
    }

    let mut source = match self.io.open_source(&self.job.input) {
      Ok(source) => source,
      Err(e) => {
        error!("无法打开输入 {}: {}", self.job.input, e);
        self.state = WorkerState::Errored;
        return WorkerOutcome::failed(FailureKind::SourceOpen, 0, e.to_string());
      }
    };
    let (width, height) = (source.width(), source.height());
    let declared_fps = source
      .fps()
      .map(|fps| format!("{:.2}", fps))
      .unwrap_or_else(|| "未知".to_string());

    let mut sink = match self.io.open_sink(&self.job.output, width, height) {
      Ok(sink) => sink,
      Err(e) => {
        error!("无法打开输出 {}: {}", self.job.output, e);
        self.state = WorkerState::Errored;
        return WorkerOutcome::failed(FailureKind::SinkOpen, 0, e.to_string());
      }
    };

    info!(
      "开始处理: {:?} {}x{} -> {} @ {} fps",
      source.source_type(),
      width,
      height,
      self.job.output,
      sink.fps()
    );
    self.state = WorkerState::Running;
    let started = Instant::now();

    let mut frames = 0u64;
    let mut failure = None;
    let mut reason = StopReason::EndOfStream;

    loop {
      let frame = match source.next() {
        None => break,
        Some(Ok(frame)) => frame,
        Some(Err(e)) => {
          warn!("读取帧失败，按流结束处理: {}", e);
          reason = StopReason::ReadError;
          break;
        }
      };

      match self.process(&frame, model, &mut sink) {
        Ok(kept) => {
          frames += 1;
          info!(
            "帧 {} 已处理: {} 个目标, 声明帧率 {}",
            frame.index, kept, declared_fps
          );
        }
        Err(stage) => {
          error!("第 {} 帧{}: {}", frame.index, stage.kind, stage.message);
          failure = Some(stage);
          break;
        }
      }

      if let Some(budget) = self.job.duration {
        if started.elapsed() >= budget {
          info!("已达到时长上限 {:?}", budget);
          reason = StopReason::DurationExpired;
          break;
        }
      }
    }

    drop(source);
    self.state = match failure {
      Some(_) => WorkerState::Errored,
      None => WorkerState::Draining,
    };
    let finished = sink.finish();
    let written = sink.frames_written();
    drop(sink);

    match (failure, finished) {
      (Some(stage), finished) => {
        if let Err(e) = finished {
          warn!("截断输出收尾失败（已写入 {} 帧）: {}", written, e);
        }
        WorkerOutcome::failed(stage.kind, frames, stage.message)
      }
      (None, Ok(_)) => {
        self.state = WorkerState::Closed;
        info!(
          "处理完成: 共 {} 帧，写入 {} 帧，用时 {:.2?} ({:?})",
          frames,
          written,
          started.elapsed(),
          reason
        );
        WorkerOutcome::Completed { frames, reason }
      }
      (None, Err(e)) => {
        self.state = WorkerState::Closed;
        error!("输出收尾失败（已写入 {} 帧）: {}", written, e);
        WorkerOutcome::failed(FailureKind::Finalize, frames, e.to_string())
      }
    }
  }

  fn process<M>(&self, frame: &Frame, model: &M, sink: &mut I::Sink) -> Result<usize, StageFailure>
  where
    M: Model<Input = RgbImage, Output = DetectResult>,
    M::Error: Display,
  {
    let result = model
      .infer(&frame.image)
      .map_err(|e| StageFailure::new(FailureKind::Detect, e))?;
    let kept = self.policy.filter(&result.items);

    let annotated = annotate(&frame.image, &kept);
    let gray = to_grayscale(&DynamicImage::ImageRgb8(annotated))
      .map_err(|e| StageFailure::new(FailureKind::Transform, e))?;

    sink.write(&gray).map_err(|e| match e {
      OutputError::TransformError(_) => StageFailure::new(FailureKind::Transform, e),
      _ => StageFailure::new(FailureKind::Write, e),
    })?;

    Ok(kept.len())
  }
}

/// 在当前线程上处理一路流
pub fn run_job<M>(job: StreamJob, policy: DetectionPolicy, model: &M) -> WorkerOutcome
where
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: Display,
{
  StreamWorker::new(job, policy).run(model)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::timestamp_for;
  use crate::input::InputSourceType;
  use crate::model::{DetectItem, StaticModel};
  use image::GrayImage;
  use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use std::thread;
  use tracing::{Event, Level, Subscriber};
  use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

  #[derive(Clone, Default)]
  struct Probe {
    source_released: Arc<AtomicBool>,
    sink_opened: Arc<AtomicBool>,
    sink_finished: Arc<AtomicBool>,
    sink_released: Arc<AtomicBool>,
    written: Arc<Mutex<Vec<GrayImage>>>,
  }

  #[derive(Clone, Default)]
  struct ProbeIo {
    probe: Probe,
    frames: Option<u64>,
    delay: Duration,
    read_error_at: Option<u64>,
    fail_source_open: bool,
    fail_sink_open: bool,
    fail_write_at: Option<u64>,
    fail_finish: bool,
  }

  struct ProbeSource {
    io: ProbeIo,
    index: u64,
  }

  impl Iterator for ProbeSource {
    type Item = Result<Frame, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
      if self.io.frames.is_some_and(|total| self.index >= total) {
        return None;
      }
      let index = self.index;
      self.index += 1;
      if self.io.read_error_at == Some(index) {
        return Some(Err(InputError::SchemeMismatch("broken".to_string())));
      }
      thread::sleep(self.io.delay);
      let image = RgbImage::from_pixel(16, 12, image::Rgb([40, 40, 40]));
      Some(Ok(Frame::new(image, index, timestamp_for(index, Some(20.0)))))
    }
  }

  impl FrameSource for ProbeSource {
    fn source_type(&self) -> InputSourceType {
      InputSourceType::TestPattern
    }

    fn width(&self) -> u32 {
      16
    }

    fn height(&self) -> u32 {
      12
    }

    fn fps(&self) -> Option<f64> {
      Some(20.0)
    }
  }

  impl Drop for ProbeSource {
    fn drop(&mut self) {
      self.io.probe.source_released.store(true, Ordering::SeqCst);
    }
  }

  struct ProbeSink {
    io: ProbeIo,
    count: u64,
  }

  impl FrameSink for ProbeSink {
    fn width(&self) -> u32 {
      16
    }

    fn height(&self) -> u32 {
      12
    }

    fn fps(&self) -> u32 {
      20
    }

    fn write(&mut self, frame: &GrayImage) -> Result<(), OutputError> {
      if self.io.fail_write_at == Some(self.count) {
        return Err(OutputError::Finished);
      }
      self.count += 1;
      self.io.probe.written.lock().unwrap().push(frame.clone());
      Ok(())
    }

    fn finish(&mut self) -> Result<u64, OutputError> {
      self.io.probe.sink_finished.store(true, Ordering::SeqCst);
      if self.io.fail_finish {
        return Err(OutputError::InvalidFps("finish".to_string()));
      }
      Ok(self.count)
    }

    fn frames_written(&self) -> u64 {
      self.count
    }
  }

  impl Drop for ProbeSink {
    fn drop(&mut self) {
      self.io.probe.sink_released.store(true, Ordering::SeqCst);
    }
  }

  impl MediaIo for ProbeIo {
    type Source = ProbeSource;
    type Sink = ProbeSink;

    fn open_source(&self, url: &Url) -> Result<Self::Source, InputError> {
      if self.fail_source_open {
        return Err(InputError::SchemeMismatch(url.scheme().to_string()));
      }
      Ok(ProbeSource {
        io: self.clone(),
        index: 0,
      })
    }

    fn open_sink(&self, url: &Url, _width: u32, _height: u32) -> Result<Self::Sink, OutputError> {
      if self.fail_sink_open {
        return Err(OutputError::SchemeMismatch(url.scheme().to_string()));
      }
      self.probe.sink_opened.store(true, Ordering::SeqCst);
      Ok(ProbeSink {
        io: self.clone(),
        count: 0,
      })
    }
  }

  struct FailingAfter {
    ok_calls: u64,
    calls: AtomicU64,
  }

  impl Model for FailingAfter {
    type Input = RgbImage;
    type Output = DetectResult;
    type Error = String;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
        return Err("engine fault".to_string());
      }
      Ok(DetectResult::default())
    }
  }

  struct ErrorCounter(Arc<AtomicUsize>);

  impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
      if *event.metadata().level() == Level::ERROR {
        self.0.fetch_add(1, Ordering::SeqCst);
      }
    }
  }

  fn job(duration: Option<Duration>) -> StreamJob {
    StreamJob::new(
      Url::parse("probe://in").unwrap(),
      Url::parse("probe://out").unwrap(),
      duration,
    )
  }

  fn person_model() -> StaticModel {
    StaticModel::new(vec![DetectItem::new(0, 0.9, [0.0, 0.0, 1.0, 1.0])])
  }

  #[test]
  fn runs_until_end_of_stream() {
    let io = ProbeIo {
      frames: Some(5),
      ..Default::default()
    };
    let probe = io.probe.clone();
    let mut worker = StreamWorker::with_io(job(None), DetectionPolicy::default(), io);

    let outcome = worker.run(&person_model());
    assert_eq!(
      outcome,
      WorkerOutcome::Completed {
        frames: 5,
        reason: StopReason::EndOfStream,
      }
    );
    assert_eq!(worker.state(), WorkerState::Closed);
    assert!(probe.source_released.load(Ordering::SeqCst));
    assert!(probe.sink_finished.load(Ordering::SeqCst));
    assert!(probe.sink_released.load(Ordering::SeqCst));

    let written = probe.written.lock().unwrap();
    assert_eq!(written.len(), 5);
    // 全画面框：边缘为绿色的灰度值，内部为原灰度
    assert_eq!(written[0].get_pixel(0, 0).0, [150]);
    assert_eq!(written[0].get_pixel(15, 11).0, [150]);
    assert_eq!(written[0].get_pixel(8, 6).0, [40]);
  }

  #[test]
  fn low_confidence_boxes_are_not_drawn() {
    let io = ProbeIo {
      frames: Some(1),
      ..Default::default()
    };
    let probe = io.probe.clone();
    let model = StaticModel::new(vec![
      DetectItem::new(0, 0.3, [0.0, 0.0, 1.0, 1.0]),
      DetectItem::new(2, 0.99, [0.0, 0.0, 1.0, 1.0]),
    ]);
    let outcome = StreamWorker::with_io(job(None), DetectionPolicy::default(), io).run(&model);
    assert!(outcome.is_success());
    assert_eq!(probe.written.lock().unwrap()[0].get_pixel(0, 0).0, [40]);
  }

  #[test]
  fn duration_budget_stops_an_endless_stream() {
    let io = ProbeIo {
      frames: None,
      delay: Duration::from_millis(50),
      ..Default::default()
    };
    let probe = io.probe.clone();
    let mut worker = StreamWorker::with_io(
      job(Some(Duration::from_secs(2))),
      DetectionPolicy::default(),
      io,
    );

    let started = Instant::now();
    let outcome = worker.run(&person_model());
    let elapsed = started.elapsed();

    assert!(matches!(
      outcome,
      WorkerOutcome::Completed {
        reason: StopReason::DurationExpired,
        ..
      }
    ));
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_millis(2500), "{:?}", elapsed);
    assert!(outcome.frames() >= 30);
    assert!(probe.source_released.load(Ordering::SeqCst));
    assert!(probe.sink_finished.load(Ordering::SeqCst));
    assert!(probe.sink_released.load(Ordering::SeqCst));
  }

  #[test]
  fn source_open_failure_logs_one_error_and_creates_no_output() {
    let io = ProbeIo {
      fail_source_open: true,
      ..Default::default()
    };
    let probe = io.probe.clone();
    let mut worker = StreamWorker::with_io(job(None), DetectionPolicy::default(), io);

    let errors = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
    let outcome = tracing::subscriber::with_default(subscriber, || worker.run(&person_model()));

    assert!(matches!(
      outcome,
      WorkerOutcome::Failed {
        kind: FailureKind::SourceOpen,
        frames: 0,
        ..
      }
    ));
    assert_eq!(worker.state(), WorkerState::Errored);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(!probe.sink_opened.load(Ordering::SeqCst));
  }

  #[test]
  fn sink_open_failure_releases_the_source() {
    let io = ProbeIo {
      frames: Some(3),
      fail_sink_open: true,
      ..Default::default()
    };
    let probe = io.probe.clone();
    let mut worker = StreamWorker::with_io(job(None), DetectionPolicy::default(), io);

    let outcome = worker.run(&person_model());
    assert!(matches!(
      outcome,
      WorkerOutcome::Failed {
        kind: FailureKind::SinkOpen,
        ..
      }
    ));
    assert_eq!(worker.state(), WorkerState::Errored);
    assert!(probe.source_released.load(Ordering::SeqCst));
  }

  #[test]
  fn detection_failure_still_finalizes_output() {
    let io = ProbeIo {
      frames: Some(10),
      ..Default::default()
    };
    let probe = io.probe.clone();
    let model = FailingAfter {
      ok_calls: 2,
      calls: AtomicU64::new(0),
    };
    let mut worker = StreamWorker::with_io(job(None), DetectionPolicy::default(), io);

    let outcome = worker.run(&model);
    assert!(matches!(
      outcome,
      WorkerOutcome::Failed {
        kind: FailureKind::Detect,
        frames: 2,
        ..
      }
    ));
    assert_eq!(worker.state(), WorkerState::Errored);
    assert!(probe.sink_finished.load(Ordering::SeqCst));
    assert_eq!(probe.written.lock().unwrap().len(), 2);
  }

  #[test]
  fn write_failure_is_reported() {
    let io = ProbeIo {
      frames: Some(4),
      fail_write_at: Some(1),
      ..Default::default()
    };
    let outcome =
      StreamWorker::with_io(job(None), DetectionPolicy::default(), io).run(&person_model());
    assert!(matches!(
      outcome,
      WorkerOutcome::Failed {
        kind: FailureKind::Write,
        frames: 1,
        ..
      }
    ));
  }

  #[test]
  fn read_error_is_treated_as_end_of_stream() {
    let io = ProbeIo {
      frames: Some(10),
      read_error_at: Some(3),
      ..Default::default()
    };
    let probe = io.probe.clone();
    let outcome =
      StreamWorker::with_io(job(None), DetectionPolicy::default(), io).run(&person_model());
    assert_eq!(
      outcome,
      WorkerOutcome::Completed {
        frames: 3,
        reason: StopReason::ReadError,
      }
    );
    assert!(probe.sink_finished.load(Ordering::SeqCst));
  }

  #[test]
  fn finalize_failure_is_reported() {
    let io = ProbeIo {
      frames: Some(2),
      fail_finish: true,
      ..Default::default()
    };
    let mut worker = StreamWorker::with_io(job(None), DetectionPolicy::default(), io);
    let outcome = worker.run(&person_model());
    assert!(matches!(
      outcome,
      WorkerOutcome::Failed {
        kind: FailureKind::Finalize,
        frames: 2,
        ..
      }
    ));
    assert_eq!(worker.state(), WorkerState::Closed);
  }

  #[test]
  fn worker_cannot_run_twice() {
    let io = ProbeIo {
      frames: Some(1),
      ..Default::default()
    };
    let mut worker = StreamWorker::with_io(job(None), DetectionPolicy::default(), io);
    assert!(worker.run(&person_model()).is_success());
    assert!(matches!(
      worker.run(&person_model()),
      WorkerOutcome::Failed {
        kind: FailureKind::Spent,
        ..
      }
    ));
    assert_eq!(worker.state(), WorkerState::Closed);
  }

  #[test]
  fn outcome_serializes_with_status_tag() {
    let outcome = WorkerOutcome::failed(FailureKind::SourceOpen, 0, "no such file");
    let json = serde_json::to_string(&outcome).unwrap();
    assert!(json.contains(r#""status":"failed""#));
    assert!(json.contains(r#""kind":"source_open""#));
    assert_eq!(serde_json::from_str::<WorkerOutcome>(&json).unwrap(), outcome);
  }

  #[test]
  fn exit_codes_map_back_to_failure_kinds() {
    assert_eq!(FailureKind::SourceOpen.exit_code(), 10);
    for kind in FailureKind::ALL {
      assert_eq!(FailureKind::from_exit_code(kind.exit_code()), Some(kind));
    }
    assert_eq!(FailureKind::from_exit_code(0), None);
    assert_eq!(FailureKind::from_exit_code(1), None);
  }
}
