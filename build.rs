// 该文件是 YOLO Bridge 项目的一部分。
// build.rs - 嵌入原生动态库
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

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

const LIBRARY_NAME: &str = "obb_extractor";
const ARCHES: [&str; 3] = ["x86", "x64", "arm64"];

fn library_file_name(target_os: &str) -> String {
  match target_os {
    "windows" => format!("{}.dll", LIBRARY_NAME),
    "macos" | "ios" => format!("lib{}.dylib", LIBRARY_NAME),
    _ => format!("lib{}.so", LIBRARY_NAME),
  }
}

/// Rust 目标架构对应的发布目录名
fn arch_dir(target_arch: &str) -> Option<&'static str> {
  match target_arch {
    "x86" => Some("x86"),
    "x86_64" => Some("x64"),
    "aarch64" => Some("arm64"),
    _ => None,
  }
}

fn main() {
  println!("cargo:rerun-if-changed=build.rs");
  println!("cargo:rerun-if-env-changed=YOLO_BRIDGE_NATIVE_DIR");

  let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
  let native_dir = env::var_os("YOLO_BRIDGE_NATIVE_DIR")
    .map(PathBuf::from)
    .unwrap_or_else(|| manifest_dir.join("native"));
  let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
  let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
  let file_name = library_file_name(&target_os);

  // 集成测试用同一目标编译原生桩库
  for key in ["TARGET", "HOST"] {
    if let Ok(value) = env::var(key) {
      println!("cargo:rustc-env=YOLO_BRIDGE_{}={}", key, value);
    }
  }
  if native_dir.is_dir() {
    println!("cargo:rerun-if-changed={}", native_dir.display());
  }

  let mut code = String::new();
  writeln!(code, "pub(crate) const LIBRARY_FILE_NAME: &str = {:?};", file_name).unwrap();

  // 只嵌入目标架构的库，其余架构在运行时不可能被选中
  let wanted = arch_dir(&target_arch);
  for arch in ARCHES {
    let path = native_dir.join(arch).join(&file_name);

    let value = if Some(arch) == wanted && path.is_file() {
      println!("cargo:rerun-if-changed={}", path.display());
      println!("cargo:warning=嵌入原生库: {}", path.display());
      format!("Some(include_bytes!({:?}))", path.display().to_string())
    } else {
      "None".to_string()
    };
    writeln!(
      code,
      "pub(crate) const EMBEDDED_{}: Option<&[u8]> = {};",
      arch.to_uppercase(),
      value
    )
    .unwrap();
  }

  let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
  fs::write(out_dir.join("payloads.rs"), code).expect("无法写入 payloads.rs");
}
