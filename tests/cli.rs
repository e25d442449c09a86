// 该文件是 Duolu （多路灰影） 项目的一部分。
// tests/cli.rs - 命令行与进程隔离测试
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
use std::process::{Command, Output};

use duolu::{
  output::{MANIFEST_FILE, SequenceManifest},
  worker::{FailureKind, WorkerOutcome},
};

const MODEL: &str = "static://?det=0,0,1,1,person,0.9";

fn duolu() -> Command {
  Command::new(env!("CARGO_BIN_EXE_duolu"))
}

fn frames_locator(dir: &Path) -> String {
  format!("frames://{}", dir.display())
}

fn read_manifest(dir: &Path) -> SequenceManifest {
  serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE)).unwrap()).unwrap()
}

struct Feeds {
  _dir: tempfile::TempDir,
  outputs: Vec<PathBuf>,
  args: Vec<String>,
}

/// 三路流，中间一路的输入文件不存在
fn three_feeds_with_missing_middle() -> Feeds {
  let dir = tempfile::tempdir().unwrap();
  let outputs: Vec<PathBuf> = (0..3).map(|i| dir.path().join(format!("out-{}", i))).collect();
  let missing = dir.path().join("missing").join("v.mp4");

  let inputs = [
    "pattern://?width=32&height=24&frames=20".to_string(),
    missing.display().to_string(),
    "pattern://?width=32&height=24&frames=7".to_string(),
  ];

  let mut args = vec!["run".to_string(), "--model".to_string(), MODEL.to_string()];
  for (input, output) in inputs.iter().zip(&outputs) {
    args.push("--input".to_string());
    args.push(input.clone());
    args.push("--output".to_string());
    args.push(frames_locator(output));
  }

  Feeds {
    _dir: dir,
    outputs,
    args,
  }
}

fn run(args: &[String]) -> Output {
  duolu().args(args).output().unwrap()
}

#[test]
fn process_isolation_keeps_siblings_of_a_failed_feed() {
  let feeds = three_feeds_with_missing_middle();
  let output = run(&feeds.args);

  assert_eq!(
    output.status.code(),
    Some(0),
    "stderr: {}",
    String::from_utf8_lossy(&output.stderr)
  );
  assert_eq!(read_manifest(&feeds.outputs[0]).frames, 20);
  assert!(!feeds.outputs[1].exists());
  assert_eq!(read_manifest(&feeds.outputs[2]).frames, 7);

  let manifest = read_manifest(&feeds.outputs[0]);
  let first = image::open(feeds.outputs[0].join(&manifest.files[0])).unwrap();
  assert!(matches!(first, image::DynamicImage::ImageLuma8(_)));
  assert_eq!(first.to_luma8().get_pixel(0, 0).0, [150]);
}

#[test]
fn fail_on_error_turns_partial_failure_into_exit_status() {
  let feeds = three_feeds_with_missing_middle();
  let mut args = feeds.args.clone();
  args.push("--fail-on-error".to_string());

  let output = run(&args);
  assert_eq!(output.status.code(), Some(1));
  assert_eq!(read_manifest(&feeds.outputs[0]).frames, 20);
  assert_eq!(read_manifest(&feeds.outputs[2]).frames, 7);
}

#[test]
fn thread_isolation_matches_process_isolation() {
  let feeds = three_feeds_with_missing_middle();
  let mut args = feeds.args.clone();
  args.extend(["--isolation".to_string(), "thread".to_string()]);

  let output = run(&args);
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(read_manifest(&feeds.outputs[0]).frames, 20);
  assert!(!feeds.outputs[1].exists());
  assert_eq!(read_manifest(&feeds.outputs[2]).frames, 7);
}

#[test]
fn worker_reports_outcome_on_stdout_and_exit_code() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("single");

  let output = duolu()
    .args(["worker", "--model", MODEL, "--input", "pattern://?width=16&height=16&frames=4"])
    .arg("--output")
    .arg(frames_locator(&out))
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(0));
  let stdout = String::from_utf8_lossy(&output.stdout);
  let outcome: WorkerOutcome = serde_json::from_str(stdout.trim()).unwrap();
  assert_eq!(outcome.frames(), 4);
  assert_eq!(read_manifest(&out).frames, 4);

  let output = duolu()
    .args(["worker", "--model", MODEL])
    .arg("--input")
    .arg(frames_locator(&dir.path().join("absent")))
    .arg("--output")
    .arg(frames_locator(&dir.path().join("unused")))
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(FailureKind::SourceOpen.exit_code()));
  let stdout = String::from_utf8_lossy(&output.stdout);
  let outcome: WorkerOutcome = serde_json::from_str(stdout.trim()).unwrap();
  assert!(matches!(
    outcome,
    WorkerOutcome::Failed {
      kind: FailureKind::SourceOpen,
      ..
    }
  ));
  assert!(!dir.path().join("unused").exists());
}

#[test]
fn configuration_errors_exit_before_launching() {
  let output = duolu()
    .args(["run", "--model", MODEL, "--input", "pattern://"])
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(2));
}
