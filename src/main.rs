// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::ffi::OsString;
use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use duolu::{
  FromUrl,
  config::{self, ConfigError},
  feed::{FeedManager, FeedReport, ProcessLauncher, ThreadLauncher},
  model::{InferenceService, ModelWrapper},
  worker::{FailureKind, StreamJob, WorkerOutcome, run_job},
};

use args::{Args, Command, Isolation, RunArgs, WorkerArgs};

/// 配置错误的退出码
const CONFIG_EXIT_CODE: i32 = 2;

fn main() -> Result<()> {
  // 标准输出留给工作进程回报结果
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  match args.command {
    Command::Run(run) => run_feeds(run),
    Command::Worker(worker) => run_worker(worker),
  }
}

fn config_failure(e: ConfigError) -> ! {
  error!("配置错误: {}", e);
  std::process::exit(CONFIG_EXIT_CODE);
}

fn run_feeds(args: RunArgs) -> Result<()> {
  let jobs = config::build_jobs(
    &args.input,
    &args.output,
    args.feeds.as_deref(),
    args.duration,
  )
  .unwrap_or_else(|e| config_failure(e));
  config::ensure_output_dirs(&jobs).unwrap_or_else(|e| config_failure(e));

  info!("模型: {}", args.model.model);
  info!(
    "目标类别: {}，置信度阈值: {}",
    duolu::model::label_of(args.model.target_class),
    args.model.confidence
  );
  info!("共 {} 路流，隔离方式: {:?}", jobs.len(), args.isolation);

  let report = match args.isolation {
    Isolation::Process => run_in_processes(&args, jobs)?,
    Isolation::Thread => run_in_threads(&args, jobs)?,
  };

  report.log_summary();
  if args.fail_on_error && !report.is_success() {
    std::process::exit(1);
  }
  Ok(())
}

fn run_in_processes(args: &RunArgs, jobs: Vec<StreamJob>) -> Result<FeedReport> {
  let mut forward: Vec<OsString> = vec!["worker".into()];
  forward.extend(args.model.forward());
  let manager = FeedManager::new(ProcessLauncher::current_exe(forward)?);
  Ok(manager.run(jobs))
}

fn run_in_threads(args: &RunArgs, jobs: Vec<StreamJob>) -> Result<FeedReport> {
  let url = args.model.model.clone();
  let service = InferenceService::spawn(move || ModelWrapper::from_url(&url))?;

  let client = service.client();
  let policy = args.model.policy();
  let report = {
    let manager = FeedManager::new(ThreadLauncher::new(move |job| {
      run_job(job, policy, &client)
    }));
    manager.run(jobs)
  };

  service.shutdown();
  Ok(report)
}

fn run_worker(args: WorkerArgs) -> Result<()> {
  let input = config::parse_locator(&args.input).unwrap_or_else(|e| config_failure(e));
  let output = config::parse_locator(&args.output).unwrap_or_else(|e| config_failure(e));
  let duration = args
    .duration
    .map(config::duration_from_secs)
    .transpose()
    .unwrap_or_else(|e| config_failure(e));
  let job = StreamJob::new(input, output, duration);

  let outcome = match ModelWrapper::from_url(&args.model.model) {
    Ok(model) => run_job(job, args.model.policy(), &model),
    Err(e) => {
      error!("无法加载模型 {}: {}", args.model.model, e);
      WorkerOutcome::failed(FailureKind::ModelLoad, 0, e.to_string())
    }
  };

  let line = serde_json::to_string(&outcome)?;
  let mut stdout = std::io::stdout().lock();
  writeln!(stdout, "{}", line)?;
  stdout.flush()?;
  drop(stdout);

  std::process::exit(outcome.exit_code());
}
