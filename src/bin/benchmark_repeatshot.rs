// 该文件是 YOLO Bridge 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理基准测试
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
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// YOLO Bridge 重复推理基准测试
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径, 例如 yolo:///models/yolov5l.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图片路径
  #[arg(long, value_name = "IMAGE")]
  pub input: PathBuf,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "log:?quiet")]
  pub output: Url,
  /// 推理次数
  #[arg(long, value_name = "TIMES", default_value = "1000")]
  pub times: usize,
  /// 不计入统计的预热次数
  #[arg(long, value_name = "WARMUP", default_value = "2")]
  pub warmup: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入图片: {}", args.input.display());
  info!("推理次数: {}", args.times);

  let model = DetectorBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let average = RepeatShotTask::default()
    .with_times(args.times)
    .with_warmup(args.warmup)
    .run_task(std::iter::once(args.input), &model, output)?;
  if let Some(average) = average {
    println!("平均推理时间: {:.2?}", average);
  }

  Ok(())
}
