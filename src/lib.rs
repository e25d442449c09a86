// 该文件是 Duolu （多路灰影） 项目的一部分。
// src/lib.rs - 库主文件
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

use std::collections::HashMap;
use std::path::PathBuf;

use url::Url;

pub mod config;
pub mod feed;
pub mod filter;
pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod worker;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将 URL 的路径部分还原为本地文件系统路径（处理百分号编码）
pub(crate) fn url_to_path(url: &Url) -> PathBuf {
  match urlencoding::decode(url.path()) {
    Ok(path) => PathBuf::from(path.into_owned()),
    Err(_) => PathBuf::from(url.path()),
  }
}

pub(crate) fn query_map(url: &Url) -> HashMap<String, String> {
  url
    .query_pairs()
    .map(|(k, v)| (String::from(k), String::from(v)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_path_is_percent_decoded() {
    let url = Url::parse("frames:///tmp/my%20clips/out").unwrap();
    assert_eq!(url_to_path(&url), PathBuf::from("/tmp/my clips/out"));
  }

  #[test]
  fn query_pairs_are_collected() {
    let url = Url::parse("pattern://?width=64&height=48").unwrap();
    let query = query_map(&url);
    assert_eq!(query.get("width").map(String::as_str), Some("64"));
    assert_eq!(query.get("height").map(String::as_str), Some("48"));
  }
}
