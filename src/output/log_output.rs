// 该文件是 YOLO Bridge 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::DetectResult, output::Render};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 通过 tracing 打印检测结果
#[derive(Debug, Default)]
pub struct LogOutput {
  /// 为 `false` 时只打印数量
  verbose: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }

    let verbose = !url.query_pairs().any(|(k, _)| k == "quiet");
    Ok(LogOutput { verbose })
  }
}

impl Render<PathBuf, DetectResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, frame: &PathBuf, result: &DetectResult) -> Result<(), Self::Error> {
    info!("{}: 检测到 {} 个对象", frame.display(), result.len());
    if result.is_saturated() {
      warn!("检测数达到缓冲区容量 {}", result.capacity);
    }
    if self.verbose {
      for det in result {
        info!(
          "  - 类别 {}: {:.4} at ({}, {}, {}x{})",
          det.class_id,
          det.confidence,
          det.bbox.x,
          det.bbox.y,
          det.bbox.width,
          det.bbox.height
        );
      }
    }
    Ok(())
  }
}
