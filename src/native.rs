// 该文件是 YOLO Bridge 项目的一部分。
// src/native.rs - 原生检测库接口
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

use std::ffi::CStr;
use std::os::raw::{c_float, c_int};
use std::sync::atomic::{AtomicBool, Ordering};

/// 原生库输出的检测框，内存布局与 `YoloBBox` 一致
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawBox {
  pub x: c_int,
  pub y: c_int,
  pub w: c_int,
  pub h: c_int,
  pub class_id: c_int,
  pub confidence: c_float,
}

const _: () = assert!(std::mem::size_of::<RawBox>() == 24);

/// 原生库的单模型占用标记
///
/// 原生库只维护一个全局模型，`init`/`detect`/`free` 都不携带实例句柄，
/// 因此同一个库在同一时刻只能有一个门面持有模型。
#[derive(Debug, Default)]
pub struct ModelSlot {
  claimed: AtomicBool,
}

impl ModelSlot {
  pub const fn new() -> Self {
    Self {
      claimed: AtomicBool::new(false),
    }
  }

  /// 尝试占用，已被占用时返回 `false`
  pub fn try_claim(&self) -> bool {
    self
      .claimed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  pub fn release(&self) {
    self.claimed.store(false, Ordering::Release);
  }

  pub fn is_claimed(&self) -> bool {
    self.claimed.load(Ordering::Acquire)
  }
}

/// 原生检测库的调用面
///
/// 返回值保持原生约定：`init` 返回 0 表示成功；`detect` 返回写入的条目数，
/// 负数表示失败。实现方负责把 `boxes.len()` 作为容量传给原生侧。
pub trait NativeApi {
  fn slot(&self) -> &ModelSlot;
  fn init(&self, model_path: &CStr) -> c_int;
  fn detect(&self, image_path: &CStr, boxes: &mut [RawBox]) -> c_int;
  fn free(&self);
}

impl<T: NativeApi + ?Sized> NativeApi for &T {
  fn slot(&self) -> &ModelSlot {
    (**self).slot()
  }

  fn init(&self, model_path: &CStr) -> c_int {
    (**self).init(model_path)
  }

  fn detect(&self, image_path: &CStr, boxes: &mut [RawBox]) -> c_int {
    (**self).detect(image_path, boxes)
  }

  fn free(&self) {
    (**self).free()
  }
}

mod library;
pub mod payload;

pub use self::library::{LoaderConfig, NativeLibrary};
pub use self::payload::{Arch, Extractor, LoaderError};
