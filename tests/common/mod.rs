// 该文件是 YOLO Bridge 项目的一部分。
// tests/common/mod.rs - 测试公共设施
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

#![allow(dead_code)]

pub mod stub_library;

use std::ffi::CStr;
use std::os::raw::c_int;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::NamedTempFile;
use yolo_bridge::native::{ModelSlot, NativeApi, RawBox};

/// 桩 `yolo_detect` 每次调用的行为
#[derive(Debug, Clone)]
pub enum DetectScript {
  /// 写入这些记录（不超过缓冲区长度）并返回条目数
  Records(Vec<RawBox>),
  /// 不写入，直接返回错误码
  Fail(c_int),
  /// 不写入，只返回给定的条目数
  Report(c_int),
}

/// 记录每次调用的原生库桩
pub struct StubApi {
  slot: ModelSlot,
  init_code: c_int,
  script: Mutex<DetectScript>,
  init_calls: AtomicUsize,
  detect_calls: AtomicUsize,
  free_calls: AtomicUsize,
  last_capacity: AtomicUsize,
  last_image: Mutex<Option<String>>,
}

impl StubApi {
  pub fn new() -> Self {
    Self::with_init_code(0)
  }

  pub fn with_init_code(init_code: c_int) -> Self {
    StubApi {
      slot: ModelSlot::new(),
      init_code,
      script: Mutex::new(DetectScript::Records(Vec::new())),
      init_calls: AtomicUsize::new(0),
      detect_calls: AtomicUsize::new(0),
      free_calls: AtomicUsize::new(0),
      last_capacity: AtomicUsize::new(0),
      last_image: Mutex::new(None),
    }
  }

  pub fn script(self, script: DetectScript) -> Self {
    *self.script.lock().unwrap() = script;
    self
  }

  pub fn init_calls(&self) -> usize {
    self.init_calls.load(Ordering::SeqCst)
  }

  pub fn detect_calls(&self) -> usize {
    self.detect_calls.load(Ordering::SeqCst)
  }

  pub fn free_calls(&self) -> usize {
    self.free_calls.load(Ordering::SeqCst)
  }

  pub fn last_capacity(&self) -> usize {
    self.last_capacity.load(Ordering::SeqCst)
  }

  pub fn last_image(&self) -> Option<String> {
    self.last_image.lock().unwrap().clone()
  }

  pub fn is_claimed(&self) -> bool {
    self.slot.is_claimed()
  }
}

impl NativeApi for StubApi {
  fn slot(&self) -> &ModelSlot {
    &self.slot
  }

  fn init(&self, _model_path: &CStr) -> c_int {
    self.init_calls.fetch_add(1, Ordering::SeqCst);
    self.init_code
  }

  fn detect(&self, image_path: &CStr, boxes: &mut [RawBox]) -> c_int {
    self.detect_calls.fetch_add(1, Ordering::SeqCst);
    self.last_capacity.store(boxes.len(), Ordering::SeqCst);
    *self.last_image.lock().unwrap() = Some(image_path.to_string_lossy().into_owned());

    match &*self.script.lock().unwrap() {
      DetectScript::Records(records) => {
        let count = records.len().min(boxes.len());
        boxes[..count].copy_from_slice(&records[..count]);
        count as c_int
      }
      DetectScript::Fail(code) => *code,
      DetectScript::Report(count) => *count,
    }
  }

  fn free(&self) {
    self.free_calls.fetch_add(1, Ordering::SeqCst);
  }
}

/// 每个字段取值各不相同的合成检测框
pub fn synthetic_records(n: usize) -> Vec<RawBox> {
  (0..n)
    .map(|i| {
      let i = i as c_int;
      RawBox {
        x: i,
        y: i * 2 - 7,
        w: 10 + i % 97,
        h: 20 + i % 53,
        class_id: i % 80,
        confidence: f32::from_bits(0x3f00_0000 + i as u32),
      }
    })
    .collect()
}

/// 充当模型或图片的占位文件，drop 时删除
pub fn placeholder_file(suffix: &str) -> NamedTempFile {
  placeholder_named(".tmp", suffix)
}

/// 文件名以 `prefix` 开头的占位文件
pub fn placeholder_named(prefix: &str, suffix: &str) -> NamedTempFile {
  let mut file = tempfile::Builder::new()
    .prefix(prefix)
    .suffix(suffix)
    .tempfile()
    .expect("Failed to create temp file");
  std::io::Write::write_all(&mut file, b"placeholder").expect("Failed to write temp file");
  file
}
