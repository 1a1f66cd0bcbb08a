// 该文件是 YOLO Bridge 项目的一部分。
// src/native/library.rs - 原生库加载
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
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, OnceLock, PoisonError};

use libloading::Library;
use tracing::{debug, info};

use super::payload::{Arch, Extractor, LoaderError};
use super::{ModelSlot, NativeApi, RawBox};

type InitFn = unsafe extern "C" fn(*const c_char) -> c_int;
type DetectFn = unsafe extern "C" fn(*const c_char, *mut RawBox, c_int) -> c_int;
type FreeFn = unsafe extern "C" fn();

const SYMBOL_INIT: &str = "yolo_init";
const SYMBOL_DETECT: &str = "yolo_detect";
const SYMBOL_FREE: &str = "yolo_free";

const EXTRACT_DIR_ENV: &str = "YOLO_BRIDGE_EXTRACT_DIR";
const LIBRARY_ENV: &str = "YOLO_BRIDGE_LIBRARY";
const EXTRACT_DIR_NAME: &str = "yolo-bridge-native";

static LIBRARY: OnceLock<NativeLibrary> = OnceLock::new();
static LOADED_WITH: OnceLock<LoaderConfig> = OnceLock::new();
static LOAD_LOCK: Mutex<()> = Mutex::new(());

/// 按库文件区分的模型占用标记
///
/// 同一文件被多次打开时，动态加载器返回的是同一份原生全局状态，
/// 所以占用标记必须跟随文件而不是 [`NativeLibrary`] 值。
static SLOTS: LazyLock<Mutex<HashMap<PathBuf, &'static ModelSlot>>> =
  LazyLock::new(|| Mutex::new(HashMap::new()));

fn shared_slot(path: &Path) -> &'static ModelSlot {
  let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
  let mut slots = SLOTS.lock().unwrap_or_else(PoisonError::into_inner);
  slots
    .entry(key)
    .or_insert_with(|| Box::leak(Box::new(ModelSlot::new())))
}

/// 当前用户专属的默认解压目录
///
/// Unix 上临时目录为所有用户共享，目录名附带有效用户 ID。
fn default_extract_dir() -> PathBuf {
  #[cfg(unix)]
  {
    let uid = super::payload::effective_uid();
    std::env::temp_dir().join(format!("{}-{}", EXTRACT_DIR_NAME, uid))
  }
  #[cfg(not(unix))]
  {
    std::env::temp_dir().join(EXTRACT_DIR_NAME)
  }
}

/// 原生库加载配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
  /// 嵌入库的解压目录
  pub extract_dir: PathBuf,
  /// 直接加载磁盘上已有的库，跳过嵌入内容
  pub library_path: Option<PathBuf>,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      extract_dir: default_extract_dir(),
      library_path: None,
    }
  }
}

impl LoaderConfig {
  pub fn from_env() -> Self {
    let mut config = Self::default();
    if let Some(dir) = std::env::var_os(EXTRACT_DIR_ENV) {
      config.extract_dir = PathBuf::from(dir);
    }
    config.library_path = std::env::var_os(LIBRARY_ENV).map(PathBuf::from);
    config
  }
}

/// 已加载的原生检测库
pub struct NativeLibrary {
  path: PathBuf,
  slot: &'static ModelSlot,
  init: InitFn,
  detect: DetectFn,
  free: FreeFn,
  // 函数指针只在库保持加载期间有效
  _library: Library,
}

impl std::fmt::Debug for NativeLibrary {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NativeLibrary")
      .field("path", &self.path)
      .field("slot", &self.slot)
      .finish_non_exhaustive()
  }
}

impl NativeLibrary {
  /// 进程级的原生库实例，首次调用时解压并加载
  ///
  /// 加载失败不会被缓存，下次调用会重试。
  pub fn global() -> Result<&'static NativeLibrary, LoaderError> {
    Self::global_with(&LoaderConfig::from_env())
  }

  /// 同 [`NativeLibrary::global`]，使用给定配置
  ///
  /// `config` 只在首次成功加载时生效，之后的调用总是返回已加载的库。
  pub fn global_with(config: &LoaderConfig) -> Result<&'static NativeLibrary, LoaderError> {
    if let Some(library) = LIBRARY.get() {
      Self::note_ignored(config);
      return Ok(library);
    }

    let _guard = LOAD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(library) = LIBRARY.get() {
      Self::note_ignored(config);
      return Ok(library);
    }

    let library = Self::load(config)?;
    let _ = LOADED_WITH.set(config.clone());
    Ok(LIBRARY.get_or_init(|| library))
  }

  fn note_ignored(config: &LoaderConfig) {
    if let Some(loaded) = LOADED_WITH.get().filter(|loaded| *loaded != config) {
      debug!(
        "原生库已按 {:?} 加载, 忽略新的配置 {:?}",
        loaded, config
      );
    }
  }

  /// 按当前架构加载
  pub fn load(config: &LoaderConfig) -> Result<Self, LoaderError> {
    Self::load_for_target(std::env::consts::ARCH, config)
  }

  pub fn load_for_target(target: &str, config: &LoaderConfig) -> Result<Self, LoaderError> {
    let arch = Arch::from_target(target)?;
    debug!("原生库架构: {}", arch);

    if let Some(path) = &config.library_path {
      info!("使用指定的原生库: {}", path.display());
      return Self::open(path);
    }

    let payload = arch.embedded().ok_or_else(|| LoaderError::PayloadMissing {
      arch,
      resource: arch.resource_name(),
    })?;
    let path = Extractor::new(&config.extract_dir).extract(arch, payload)?;
    Self::open(&path)
  }

  /// 加载磁盘上的原生库并解析导出函数
  ///
  /// 同一文件多次打开得到的值共享一个 [`ModelSlot`]。
  pub fn open(path: &Path) -> Result<Self, LoaderError> {
    info!("加载原生库: {}", path.display());
    // SAFETY: 加载外部库会执行其初始化代码，这里信任随包分发的库
    let library = unsafe { Library::new(path) }.map_err(|source| LoaderError::LoadFailed {
      path: path.to_path_buf(),
      source,
    })?;

    let init = unsafe { symbol::<InitFn>(&library, SYMBOL_INIT)? };
    let detect = unsafe { symbol::<DetectFn>(&library, SYMBOL_DETECT)? };
    let free = unsafe { symbol::<FreeFn>(&library, SYMBOL_FREE)? };
    debug!("原生库导出函数解析完成");

    Ok(NativeLibrary {
      path: path.to_path_buf(),
      slot: shared_slot(path),
      init,
      detect,
      free,
      _library: library,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// # Safety
/// `T` 必须与导出函数的真实签名一致
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, LoaderError> {
  let mut bytes = Vec::with_capacity(name.len() + 1);
  bytes.extend_from_slice(name.as_bytes());
  bytes.push(0);
  unsafe { library.get::<T>(&bytes) }
    .map(|symbol| *symbol)
    .map_err(|source| LoaderError::SymbolMissing {
      symbol: name,
      source,
    })
}

impl NativeApi for NativeLibrary {
  fn slot(&self) -> &ModelSlot {
    self.slot
  }

  fn init(&self, model_path: &CStr) -> c_int {
    // SAFETY: 参数为有效的 C 字符串
    unsafe { (self.init)(model_path.as_ptr()) }
  }

  fn detect(&self, image_path: &CStr, boxes: &mut [RawBox]) -> c_int {
    let capacity = c_int::try_from(boxes.len()).unwrap_or(c_int::MAX);
    // SAFETY: 原生侧最多写入 capacity 个条目，缓冲区长度不小于 capacity
    unsafe { (self.detect)(image_path.as_ptr(), boxes.as_mut_ptr(), capacity) }
  }

  fn free(&self) {
    // SAFETY: 无参数调用
    unsafe { (self.free)() }
  }
}
