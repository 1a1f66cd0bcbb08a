// 该文件是 YOLO Bridge 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图片推理
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use yolo_bridge::{
  FromUrl,
  model::DetectorBuilder,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// YOLO Bridge 单次推理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径, 例如 yolo:///models/yolov5l.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图片路径
  #[arg(long, value_name = "IMAGE")]
  pub input: PathBuf,
  /// 输出路径, log: 或 jsonl:///path/to/records.jsonl
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入图片: {}", args.input.display());
  info!("输出路径: {}", args.output);

  let model = DetectorBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let result = OneShotTask.run_task(std::iter::once(args.input), &model, output)?;
  println!("检测到 {} 个对象", result.len());

  model.dispose();
  Ok(())
}
