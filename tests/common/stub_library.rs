// 该文件是 YOLO Bridge 项目的一部分。
// tests/common/stub_library.rs - 编译测试用原生库
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

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use yolo_bridge::native::NativeLibrary;

/// 编译到独立临时目录的 C 动态库
///
/// 每个实例是一个独立文件，动态加载器为它保留独立的全局状态。
pub struct StubLibrary {
  dir: TempDir,
  path: PathBuf,
}

impl StubLibrary {
  /// 编译 `tests/fixtures/<name>.c`，没有可用的 C 编译器时返回 `None`
  pub fn compile(name: &str) -> Option<Self> {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
      .join("tests")
      .join("fixtures")
      .join(format!("{}.c", name));
    let path = dir
      .path()
      .join(format!("{}{}{}", DLL_PREFIX, name, DLL_SUFFIX));

    let Some(target) = option_env!("YOLO_BRIDGE_TARGET") else {
      eprintln!("跳过: 构建脚本未提供目标三元组");
      return None;
    };
    let host = option_env!("YOLO_BRIDGE_HOST").unwrap_or(target);

    let compiler = match cc::Build::new()
      .target(target)
      .host(host)
      .opt_level(0)
      .debug(false)
      .pic(true)
      .warnings(false)
      .cargo_metadata(false)
      .try_get_compiler()
    {
      Ok(compiler) => compiler,
      Err(e) => {
        eprintln!("跳过: 没有可用的 C 编译器 ({})", e);
        return None;
      }
    };

    let status = compiler
      .to_command()
      .arg("-shared")
      .arg("-o")
      .arg(&path)
      .arg(&source)
      .status();
    match status {
      Ok(status) if status.success() => Some(StubLibrary { dir, path }),
      other => {
        eprintln!("跳过: 编译 {} 失败 ({:?})", source.display(), other);
        None
      }
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn dir(&self) -> &Path {
    self.dir.path()
  }

  pub fn open(&self) -> NativeLibrary {
    NativeLibrary::open(&self.path).expect("Failed to open stub library")
  }
}
