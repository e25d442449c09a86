// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/model/service.rs - 推理服务
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

//! 单一长驻推理线程。
//!
//! 模型在服务线程内构建并只在该线程内使用，各个工作器通过
//! [`InferenceClient`] 发送请求、等待应答，彼此之间不共享任何可变状态。
//!
//! 关闭顺序：先丢弃所有 [`InferenceClient`]，再调用 [`InferenceService::shutdown`]，
//! 否则服务线程会一直等待新的请求。

use std::fmt::Display;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{DetectResult, Model};

#[derive(Error, Debug)]
pub enum ServiceError {
  #[error("推理服务已停止")]
  Disconnected,
  #[error("推理服务初始化失败: {0}")]
  InitError(String),
  #[error("推理失败: {0}")]
  InferenceError(String),
  #[error("无法启动推理线程: {0}")]
  SpawnError(#[from] std::io::Error),
}

struct Request {
  image: RgbImage,
  reply: mpsc::Sender<Result<DetectResult, String>>,
}

pub struct InferenceService {
  sender: Option<mpsc::Sender<Request>>,
  handle: Option<JoinHandle<()>>,
}

impl InferenceService {
  /// 启动服务线程并在其中构建模型；模型构建失败时直接返回错误
  pub fn spawn<M, E, F>(factory: F) -> Result<Self, ServiceError>
  where
    F: FnOnce() -> Result<M, E> + Send + 'static,
    M: Model<Input = RgbImage, Output = DetectResult>,
    M::Error: Display,
    E: Display,
  {
    let (sender, receiver) = mpsc::channel::<Request>();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

    let handle = thread::Builder::new()
      .name("inference".to_string())
      .spawn(move || {
        let model = match factory() {
          Ok(model) => {
            let _ = ready_tx.send(Ok(()));
            model
          }
          Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
          }
        };

        let mut served = 0u64;
        for Request { image, reply } in receiver {
          let result = model.infer(&image).map_err(|e| e.to_string());
          served += 1;
          if reply.send(result).is_err() {
            debug!("请求方已退出，丢弃推理结果");
          }
        }
        info!("推理服务退出，共处理 {} 个请求", served);
      })?;

    match ready_rx.recv() {
      Ok(Ok(())) => {
        info!("推理服务已就绪");
        Ok(InferenceService {
          sender: Some(sender),
          handle: Some(handle),
        })
      }
      Ok(Err(message)) => {
        let _ = handle.join();
        Err(ServiceError::InitError(message))
      }
      Err(_) => {
        let _ = handle.join();
        Err(ServiceError::InitError("推理线程意外退出".to_string()))
      }
    }
  }

  pub fn client(&self) -> InferenceClient {
    InferenceClient {
      sender: self.sender.clone(),
    }
  }

  pub fn shutdown(mut self) {
    self.stop();
  }

  fn stop(&mut self) {
    self.sender.take();
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        warn!("推理线程异常退出");
      }
    }
  }
}

impl Drop for InferenceService {
  fn drop(&mut self) {
    self.stop();
  }
}

/// 推理服务的请求端，可以克隆给每个工作器
#[derive(Clone)]
pub struct InferenceClient {
  sender: Option<mpsc::Sender<Request>>,
}

impl Model for InferenceClient {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ServiceError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let sender = self.sender.as_ref().ok_or(ServiceError::Disconnected)?;
    let (reply, response) = mpsc::channel();
    sender
      .send(Request {
        image: input.clone(),
        reply,
      })
      .map_err(|_| ServiceError::Disconnected)?;
    response
      .recv()
      .map_err(|_| ServiceError::Disconnected)?
      .map_err(ServiceError::InferenceError)
  }
}
