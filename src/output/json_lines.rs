// 该文件是 YOLO Bridge 项目的一部分。
// src/output/json_lines.rs - JSON Lines 记录输出
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

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Detection},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("路径解码失败: {0}")]
  PathDecodeError(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Record<'a> {
  image: &'a Path,
  saturated: bool,
  detections: &'a [Detection],
}

/// 每张图片追加一行 JSON 记录
pub struct JsonLinesOutput {
  path: PathBuf,
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonLinesOutputError::SchemeMismatch);
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| JsonLinesOutputError::PathDecodeError(e.to_string()))?;
    Self::create(PathBuf::from(path.into_owned()))
  }
}

impl JsonLinesOutput {
  pub fn create(path: PathBuf) -> Result<Self, JsonLinesOutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    debug!("JSON 记录输出: {}", path.display());

    Ok(JsonLinesOutput {
      path,
      writer: Mutex::new(BufWriter::new(file)),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Render<PathBuf, DetectResult> for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_result(&self, frame: &PathBuf, result: &DetectResult) -> Result<(), Self::Error> {
    let record = Record {
      image: frame,
      saturated: result.is_saturated(),
      detections: &result.items,
    };

    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    serde_json::to_writer(&mut *writer, &record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}
