// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/feed.rs - 多路流的启动与汇合
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

//! 每路流一个隔离的工作单元，全部启动后逐个等待结束。
//!
//! 工作单元之间不共享任何可变状态；任何一路的失败只记录在该路的结果里。

use std::any::Any;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};

use crate::worker::{FailureKind, StopReason, StreamJob, WorkerOutcome};

/// 一个正在运行的工作单元
pub trait WorkerHandle {
  /// 阻塞直到工作单元结束
  fn join(self) -> WorkerOutcome;
}

/// 工作单元的启动方式
pub trait Launcher {
  type Handle: WorkerHandle;

  fn launch(&self, index: usize, job: StreamJob) -> io::Result<Self::Handle>;
}

pub type JobRunner = Arc<dyn Fn(StreamJob) -> WorkerOutcome + Send + Sync>;

/// 每路流一个系统线程
#[derive(Clone)]
pub struct ThreadLauncher {
  runner: JobRunner,
}

impl ThreadLauncher {
  pub fn new<F>(runner: F) -> Self
  where
    F: Fn(StreamJob) -> WorkerOutcome + Send + Sync + 'static,
  {
    Self {
      runner: Arc::new(runner),
    }
  }
}

pub struct ThreadHandle {
  handle: JoinHandle<WorkerOutcome>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "未知 panic".to_string()
  }
}

impl WorkerHandle for ThreadHandle {
  fn join(self) -> WorkerOutcome {
    match self.handle.join() {
      Ok(outcome) => outcome,
      Err(payload) => WorkerOutcome::Crashed {
        message: format!("工作线程 panic: {}", panic_message(payload.as_ref())),
      },
    }
  }
}

impl Launcher for ThreadLauncher {
  type Handle = ThreadHandle;

  fn launch(&self, index: usize, job: StreamJob) -> io::Result<Self::Handle> {
    let runner = Arc::clone(&self.runner);
    let handle = thread::Builder::new()
      .name(format!("stream-{}", index))
      .spawn(move || runner(job))?;
    Ok(ThreadHandle { handle })
  }
}

/// 每路流一个子进程
///
/// 子进程的命令行为 `program args... --input <url> --output <url> [--duration <秒>]`，
/// 它在标准输出的最后一行以 JSON 写出 [`WorkerOutcome`]，并以
/// [`WorkerOutcome::exit_code`] 退出。日志走标准错误。
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
  program: PathBuf,
  args: Vec<OsString>,
}

impl ProcessLauncher {
  pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }

  /// 重新执行当前程序
  pub fn current_exe(args: Vec<OsString>) -> io::Result<Self> {
    Ok(Self::new(std::env::current_exe()?, args))
  }

  fn command(&self, job: &StreamJob) -> Command {
    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .arg("--input")
      .arg(job.input.as_str())
      .arg("--output")
      .arg(job.output.as_str());
    if let Some(duration) = job.duration {
      command
        .arg("--duration")
        .arg(duration.as_secs_f64().to_string());
    }
    command
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit());
    command
  }
}

pub struct ProcessHandle {
  index: usize,
  child: Child,
}

/// 子进程没有写出结果时，按退出码还原
fn outcome_from_exit(code: Option<i32>) -> WorkerOutcome {
  match code {
    Some(0) => {
      warn!("子进程正常退出但没有汇报帧数，按 0 帧计入统计");
      WorkerOutcome::Completed {
        frames: 0,
        reason: StopReason::EndOfStream,
      }
    }
    Some(code) => match FailureKind::from_exit_code(code) {
      Some(kind) => WorkerOutcome::failed(kind, 0, format!("子进程退出码 {}", code)),
      None => WorkerOutcome::Crashed {
        message: format!("子进程退出码 {}", code),
      },
    },
    None => WorkerOutcome::Crashed {
      message: "子进程被信号终止".to_string(),
    },
  }
}

impl WorkerHandle for ProcessHandle {
  fn join(self) -> WorkerOutcome {
    let pid = self.child.id();
    let index = self.index;
    let output = match self.child.wait_with_output() {
      Ok(output) => output,
      Err(e) => {
        return WorkerOutcome::Crashed {
          message: format!("等待子进程 {} 失败: {}", pid, e),
        };
      }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let reported = stdout
      .lines()
      .rev()
      .find(|line| !line.trim().is_empty())
      .and_then(|line| serde_json::from_str::<WorkerOutcome>(line.trim()).ok());

    match reported {
      Some(outcome) => outcome,
      None => {
        warn!("第 {} 路子进程 {} 没有汇报结果，按退出状态判断", index, pid);
        outcome_from_exit(output.status.code())
      }
    }
  }
}

impl Launcher for ProcessLauncher {
  type Handle = ProcessHandle;

  fn launch(&self, index: usize, job: StreamJob) -> io::Result<Self::Handle> {
    let child = self.command(&job).spawn()?;
    info!("第 {} 路子进程已启动, pid {}", index, child.id());
    Ok(ProcessHandle { index, child })
  }
}

/// 一路流的最终结果
#[derive(Debug, Clone)]
pub struct JobReport {
  pub index: usize,
  pub job: StreamJob,
  pub outcome: WorkerOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct FeedReport {
  pub jobs: Vec<JobReport>,
}

impl FeedReport {
  pub fn failed(&self) -> usize {
    self
      .jobs
      .iter()
      .filter(|report| !report.outcome.is_success())
      .count()
  }

  pub fn is_success(&self) -> bool {
    self.failed() == 0
  }

  pub fn total_frames(&self) -> u64 {
    self.jobs.iter().map(|report| report.outcome.frames()).sum()
  }

  pub fn log_summary(&self) {
    for report in &self.jobs {
      if report.outcome.is_success() {
        info!(
          "第 {} 路 {} -> {}: {}",
          report.index, report.job.input, report.job.output, report.outcome
        );
      } else {
        warn!(
          "第 {} 路 {} -> {}: {}",
          report.index, report.job.input, report.job.output, report.outcome
        );
      }
    }
    info!(
      "全部 {} 路结束，失败 {} 路，共处理 {} 帧",
      self.jobs.len(),
      self.failed(),
      self.total_frames()
    );
  }
}

enum Slot<H> {
  Running(H),
  Done(WorkerOutcome),
}

/// 按输入顺序启动所有工作单元并等待全部结束
pub struct FeedManager<L> {
  launcher: L,
}

impl<L: Launcher> FeedManager<L> {
  pub fn new(launcher: L) -> Self {
    Self { launcher }
  }

  pub fn run(&self, jobs: Vec<StreamJob>) -> FeedReport {
    let mut slots = Vec::with_capacity(jobs.len());
    for (index, job) in jobs.into_iter().enumerate() {
      let slot = match self.launcher.launch(index, job.clone()) {
        Ok(handle) => {
          info!("已启动第 {} 路: {} -> {}", index, job.input, job.output);
          Slot::Running(handle)
        }
        Err(e) => {
          error!("无法启动第 {} 路 {}: {}", index, job.input, e);
          Slot::Done(WorkerOutcome::Crashed {
            message: format!("启动失败: {}", e),
          })
        }
      };
      slots.push((index, job, slot));
    }

    let jobs = slots
      .into_iter()
      .map(|(index, job, slot)| {
        let outcome = match slot {
          Slot::Running(handle) => handle.join(),
          Slot::Done(outcome) => outcome,
        };
        JobReport {
          index,
          job,
          outcome,
        }
      })
      .collect();

    FeedReport { jobs }
  }
}
