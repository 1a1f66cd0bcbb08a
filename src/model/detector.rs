// 该文件是 YOLO Bridge 项目的一部分。
// src/model/detector.rs - YOLO 原生检测器
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

use std::ffi::CString;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Detection, Model},
  native::{LoaderConfig, LoaderError, NativeApi, NativeLibrary, RawBox},
};

/// 单次检测的默认缓冲区容量
pub const DEFAULT_CAPACITY: usize = 4096;

pub const YOLO_SCHEME: &str = "yolo";

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("原生库错误: {0}")]
  Loader(#[from] LoaderError),
  #[error("文件不存在: [{}]", .0.display())]
  FileNotFound(PathBuf),
  #[error("路径无法传递给原生库: {}", .0.display())]
  InvalidPath(PathBuf),
  #[error("模型初始化失败, 原生错误码: {0}")]
  InitFailed(i32),
  #[error("原生检测失败, 错误码: {0}")]
  DetectFailed(i32),
  #[error("原生库返回的检测数 {count} 超出缓冲区容量 {capacity}")]
  CountOutOfRange { count: i32, capacity: usize },
  #[error("无效的缓冲区容量: {0}")]
  InvalidCapacity(usize),
  #[error("模型尚未初始化")]
  NotInitialized,
  #[error("检测器已释放")]
  Disposed,
  #[error("原生库已有活动模型")]
  ModelBusy,
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Uninitialized,
  Ready,
  Disposed,
}

#[derive(Debug)]
struct Session {
  phase: Phase,
  /// 原生侧是否持有模型，失败的重新初始化不会清除旧模型
  native_live: bool,
}

/// 原生 YOLO 检测器
///
/// 原生库只有一个全局模型，因此构造时会占用库的 [`ModelSlot`](crate::native::ModelSlot)，
/// 释放时归还。所有原生调用都在内部互斥锁下串行执行。
pub struct YoloDetector<A: NativeApi = &'static NativeLibrary> {
  api: A,
  capacity: usize,
  session: Mutex<Session>,
}

impl YoloDetector {
  /// 加载进程级原生库并初始化模型
  pub fn new(model_path: impl Into<PathBuf>) -> Result<Self, DetectorError> {
    DetectorBuilder::new(model_path).build()
  }
}

impl<A: NativeApi> YoloDetector<A> {
  /// 创建未初始化的检测器
  pub fn with_api(api: A, capacity: usize) -> Result<Self, DetectorError> {
    if capacity == 0 || capacity > c_int::MAX as usize {
      return Err(DetectorError::InvalidCapacity(capacity));
    }
    if !api.slot().try_claim() {
      warn!("原生库已有活动模型, 拒绝创建新的检测器");
      return Err(DetectorError::ModelBusy);
    }

    Ok(YoloDetector {
      api,
      capacity,
      session: Mutex::new(Session {
        phase: Phase::Uninitialized,
        native_live: false,
      }),
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn is_ready(&self) -> bool {
    self.lock().phase == Phase::Ready
  }

  pub fn is_disposed(&self) -> bool {
    self.lock().phase == Phase::Disposed
  }

  fn lock(&self) -> MutexGuard<'_, Session> {
    self.session.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn initialize(&self, model_path: impl AsRef<Path>) -> Result<(), DetectorError> {
    let model_path = model_path.as_ref();
    let mut session = self.lock();
    if session.phase == Phase::Disposed {
      return Err(DetectorError::Disposed);
    }

    let c_path = native_path(model_path)?;
    info!("加载模型文件: {}", model_path.display());
    let code = self.api.init(&c_path);
    if code != 0 {
      error!("模型初始化失败, 原生错误码: {}", code);
      session.phase = Phase::Uninitialized;
      return Err(DetectorError::InitFailed(code));
    }

    session.phase = Phase::Ready;
    session.native_live = true;
    info!("模型加载完成");
    Ok(())
  }

  pub fn detect(&self, image_path: impl AsRef<Path>) -> Result<DetectResult, DetectorError> {
    let image_path = image_path.as_ref();
    let session = self.lock();
    match session.phase {
      Phase::Uninitialized => return Err(DetectorError::NotInitialized),
      Phase::Disposed => return Err(DetectorError::Disposed),
      Phase::Ready => {}
    }

    let c_path = native_path(image_path)?;
    let mut boxes = vec![RawBox::default(); self.capacity];

    debug!("执行原生检测: {}", image_path.display());
    let now = Instant::now();
    let code = self.api.detect(&c_path, &mut boxes);
    debug!("原生检测返回 {}, 耗时: {:.2?}", code, now.elapsed());
    drop(session);

    if code < 0 {
      error!("原生检测失败, 错误码: {}", code);
      return Err(DetectorError::DetectFailed(code));
    }

    let count = code as usize;
    if count > self.capacity {
      error!("原生库返回的检测数 {} 超出容量 {}", count, self.capacity);
      return Err(DetectorError::CountOutOfRange {
        count: code,
        capacity: self.capacity,
      });
    }
    if count == self.capacity {
      warn!("检测数达到缓冲区容量 {}, 结果可能被截断", self.capacity);
    }

    boxes.truncate(count);
    let items = boxes.into_iter().map(Detection::from).collect::<Vec<_>>();
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult {
      items: items.into_boxed_slice(),
      capacity: self.capacity,
    })
  }

  /// 释放原生模型，重复调用无副作用
  pub fn dispose(&self) {
    let mut session = self.lock();
    if session.phase == Phase::Disposed {
      return;
    }

    if session.native_live {
      self.api.free();
      info!("模型已释放");
    }
    session.phase = Phase::Disposed;
    session.native_live = false;
    self.api.slot().release();
  }
}

impl<A: NativeApi> Drop for YoloDetector<A> {
  fn drop(&mut self) {
    self.dispose();
  }
}

impl<A: NativeApi> Model for YoloDetector<A> {
  type Input = PathBuf;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}

fn native_path(path: &Path) -> Result<CString, DetectorError> {
  let blank = path.to_str().is_some_and(|s| s.trim().is_empty());
  if path.as_os_str().is_empty() || blank || !path.is_file() {
    return Err(DetectorError::FileNotFound(path.to_path_buf()));
  }
  path
    .to_str()
    .and_then(|s| CString::new(s).ok())
    .ok_or_else(|| DetectorError::InvalidPath(path.to_path_buf()))
}

#[derive(Debug, Clone)]
pub struct DetectorBuilder {
  model_path: PathBuf,
  capacity: usize,
  loader: LoaderConfig,
}

impl FromUrlWithScheme for DetectorBuilder {
  const SCHEME: &'static str = YOLO_SCHEME;
}

impl FromUrl for DetectorBuilder {
  type Error = DetectorError;

  /// `yolo:///path/to/model.onnx?capacity=1024`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| DetectorError::ModelPathError(format!("路径解码失败: {}", e)))?;
    let mut builder = DetectorBuilder::new(path.into_owned());

    for (key, value) in url.query_pairs() {
      if key == "capacity" {
        let capacity = value
          .parse::<usize>()
          .map_err(|_| DetectorError::ModelPathError(format!("无效的容量参数: {}", value)))?;
        builder = builder.capacity(capacity);
      }
    }

    Ok(builder)
  }
}

impl DetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    DetectorBuilder {
      model_path: model_path.into(),
      capacity: DEFAULT_CAPACITY,
      loader: LoaderConfig::from_env(),
    }
  }

  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  pub fn loader(mut self, loader: LoaderConfig) -> Self {
    self.loader = loader;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  /// 首次调用时解压并加载原生库，随后初始化模型
  pub fn build(self) -> Result<YoloDetector, DetectorError> {
    let library = NativeLibrary::global_with(&self.loader)?;
    self.build_with(library)
  }

  pub fn build_with<A: NativeApi>(self, api: A) -> Result<YoloDetector<A>, DetectorError> {
    let detector = YoloDetector::with_api(api, self.capacity)?;
    detector.initialize(&self.model_path)?;
    Ok(detector)
  }
}
