// 该文件是 YOLO Bridge 项目的一部分。
// src/native/payload.rs - 嵌入的原生库与解压
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

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

mod generated {
  include!(concat!(env!("OUT_DIR"), "/payloads.rs"));
}

pub(crate) const LIBRARY_NAME: &str = "obb_extractor";

/// 文件名中保留的摘要长度（十六进制字符数）
const DIGEST_TAG_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum LoaderError {
  #[error("不支持的处理器架构: {0}")]
  UnsupportedArch(String),
  #[error("未找到嵌入的原生库: {resource} ({arch})")]
  PayloadMissing { arch: Arch, resource: String },
  #[error("I/O 错误 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("解压目录属于其他用户 {path} (uid {owner})")]
  UntrustedDir { path: PathBuf, owner: u32 },
  #[error("原生库加载失败 {path}: {source}")]
  LoadFailed {
    path: PathBuf,
    #[source]
    source: libloading::Error,
  },
  #[error("原生库缺少导出符号 {symbol}: {source}")]
  SymbolMissing {
    symbol: &'static str,
    #[source]
    source: libloading::Error,
  },
}

impl LoaderError {
  fn io(path: &Path, source: io::Error) -> Self {
    LoaderError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86,
  X64,
  Arm64,
}

impl Arch {
  /// 当前进程的处理器架构
  pub fn current() -> Result<Self, LoaderError> {
    Self::from_target(std::env::consts::ARCH)
  }

  /// 由 Rust 目标架构名解析，同时接受 `x64`/`arm64` 这类发布名
  pub fn from_target(name: &str) -> Result<Self, LoaderError> {
    match name {
      "x86" | "i386" | "i586" | "i686" => Ok(Arch::X86),
      "x86_64" | "x64" => Ok(Arch::X64),
      "aarch64" | "arm64" => Ok(Arch::Arm64),
      other => Err(LoaderError::UnsupportedArch(other.to_string())),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Arch::X86 => "x86",
      Arch::X64 => "x64",
      Arch::Arm64 => "arm64",
    }
  }

  /// 构建时嵌入的原生库内容
  pub fn embedded(&self) -> Option<&'static [u8]> {
    match self {
      Arch::X86 => generated::EMBEDDED_X86,
      Arch::X64 => generated::EMBEDDED_X64,
      Arch::Arm64 => generated::EMBEDDED_ARM64,
    }
  }

  /// 嵌入资源名，仅用于诊断
  pub fn resource_name(&self) -> String {
    format!("native/{}/{}", self.as_str(), generated::LIBRARY_FILE_NAME)
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 把原生库内容解压到磁盘
///
/// 文件名带有内容摘要，不同版本互不覆盖；内容一致的文件直接复用。
#[derive(Debug, Clone)]
pub struct Extractor {
  root: PathBuf,
}

impl Extractor {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn extract(&self, arch: Arch, payload: &[u8]) -> Result<PathBuf, LoaderError> {
    let digest = Sha256::digest(payload);
    let tag: String = digest
      .iter()
      .take(DIGEST_TAG_LEN / 2)
      .map(|b| format!("{:02x}", b))
      .collect();

    let dir = self.root.join(arch.as_str());
    secure_dir(&self.root)?;
    secure_dir(&dir)?;

    let file_name = format!(
      "{}{}-{}{}",
      std::env::consts::DLL_PREFIX,
      LIBRARY_NAME,
      tag,
      std::env::consts::DLL_SUFFIX
    );
    let target = dir.join(&file_name);

    if same_content(&target, digest.as_slice()).map_err(|e| LoaderError::io(&target, e))? {
      debug!("复用已解压的原生库: {}", target.display());
      return Ok(target);
    }

    // 先写入进程独占的临时文件，再整体替换，避免其他进程读到半个文件
    let staging = dir.join(format!(".{}.{}.partial", file_name, std::process::id()));
    fs::write(&staging, payload).map_err(|e| LoaderError::io(&staging, e))?;
    if let Err(e) = fs::rename(&staging, &target) {
      let _ = fs::remove_file(&staging);
      return Err(LoaderError::io(&target, e));
    }

    info!(
      "原生库已解压: {} ({:.2} MB)",
      target.display(),
      payload.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(target)
  }
}

/// 当前进程的有效用户 ID
#[cfg(unix)]
pub(crate) fn effective_uid() -> u32 {
  // SAFETY: geteuid 总是成功且无副作用
  unsafe { libc::geteuid() }
}

/// 创建或检查只属于当前用户的目录
///
/// 新建目录权限为 0700；已存在的目录必须属于当前用户，
/// 组或其他用户可访问时收紧为 0700。
#[cfg(unix)]
fn secure_dir(path: &Path) -> Result<(), LoaderError> {
  use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};

  fs::DirBuilder::new()
    .recursive(true)
    .mode(0o700)
    .create(path)
    .map_err(|e| LoaderError::io(path, e))?;

  let uid = effective_uid();
  // 符号链接本身和它指向的目录都要归当前用户所有
  let link = fs::symlink_metadata(path).map_err(|e| LoaderError::io(path, e))?;
  let meta = fs::metadata(path).map_err(|e| LoaderError::io(path, e))?;
  for owner in [link.uid(), meta.uid()] {
    if owner != uid {
      return Err(LoaderError::UntrustedDir {
        path: path.to_path_buf(),
        owner,
      });
    }
  }

  if meta.mode() & 0o077 != 0 {
    debug!("收紧解压目录权限: {} ({:o})", path.display(), meta.mode() & 0o777);
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
      .map_err(|e| LoaderError::io(path, e))?;
  }
  Ok(())
}

#[cfg(not(unix))]
fn secure_dir(path: &Path) -> Result<(), LoaderError> {
  fs::create_dir_all(path).map_err(|e| LoaderError::io(path, e))
}

fn same_content(path: &Path, digest: &[u8]) -> io::Result<bool> {
  match fs::read(path) {
    Ok(bytes) => Ok(Sha256::digest(&bytes).as_slice() == digest),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}
