// 该文件是 YOLO Bridge 项目的一部分。
// src/model.rs - 模型
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

use serde::Serialize;

use crate::native::RawBox;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<T: Model + ?Sized> Model for &T {
  type Input = T::Input;
  type Output = T::Output;
  type Error = T::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

/// 像素坐标的矩形框，原点在左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BBox {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub bbox: BBox,
  /// 类别编号，含义由模型的标签集决定
  pub class_id: i32,
  /// 原样保留原生库给出的置信度
  pub confidence: f32,
}

impl From<RawBox> for Detection {
  fn from(raw: RawBox) -> Self {
    Detection {
      bbox: BBox {
        x: raw.x,
        y: raw.y,
        width: raw.w,
        height: raw.h,
      },
      class_id: raw.class_id,
      confidence: raw.confidence,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
  #[serde(skip)]
  pub capacity: usize,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  /// 结果数达到缓冲区容量，原生侧可能截断了多余的检测
  pub fn is_saturated(&self) -> bool {
    self.capacity > 0 && self.items.len() == self.capacity
  }
}

impl<'a> IntoIterator for &'a DetectResult {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

mod detector;
pub use self::detector::{
  DEFAULT_CAPACITY, DetectorBuilder, DetectorError, YOLO_SCHEME, YoloDetector,
};
