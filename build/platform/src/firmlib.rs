// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The vendor firmware library (`framework-at32firmlib`).
//!
//! The library ships one source tree per BSP group,
//! `<framework>/<BSP>_Firmware_Library/libraries`, holding the CMSIS device
//! support code (startup files and linker scripts included) and the
//! peripheral drivers. [`configure`] points a [`BuildHost`] at the right tree
//! for a board.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;

use crate::toolchain::{Define, FlagPreset};
use crate::{Board, PlatformError};

pub const PACKAGE: &str = "framework-at32firmlib";

/// What a build system has to offer for a board to be configured against it.
pub trait BuildHost {
    fn append_flags(&mut self, flags: &FlagPreset);
    fn append_include_dirs(&mut self, dirs: &[PathBuf]);
    fn append_defines(&mut self, defines: &[Define]);
    fn set_linker_script(&mut self, path: PathBuf);
    /// Compiles the files under `source_dir` selected by `filter` (in
    /// `+<glob>`/`-<glob>` form) into a static library named `name`.
    fn register_static_library(
        &mut self,
        name: &str,
        source_dir: &Path,
        filter: &[String],
    );
}

/// Root of the library sources for a board's BSP group.
pub fn library_root(board: &Board, framework_dir: &Path) -> PathBuf {
    framework_dir
        .join(format!("{}_Firmware_Library", board.build.bsp))
        .join("libraries")
}

/// The vendor linker script for the board's product line, if the library has
/// one.
pub fn linker_script(board: &Board, framework_dir: &Path) -> Option<PathBuf> {
    let path = library_root(board, framework_dir)
        .join("cmsis/cm4/device_support/startup/gcc/linker")
        .join(format!("{}_FLASH.ld", board.build.product_line.to_uppercase()));
    if path.is_file() {
        Some(path)
    } else {
        warn!(
            "cannot find a linker script for board {}: {}",
            board.id,
            path.display()
        );
        None
    }
}

/// Configures `host` to build against the firmware library: bare-metal
/// flags, include paths, the linker script and the two static libraries.
pub fn configure<H: BuildHost + ?Sized>(
    host: &mut H,
    board: &Board,
    framework_dir: &Path,
    build_dir: &Path,
) -> Result<()> {
    if !framework_dir.is_dir() {
        return Err(PlatformError::MissingFramework(framework_dir.into()).into());
    }
    let root = library_root(board, framework_dir);
    debug!("configuring {} against {}", board.id, root.display());

    host.append_flags(&FlagPreset::bare_metal(board, build_dir));

    let device_support = root.join("cmsis/cm4/device_support");
    host.append_include_dirs(&[
        root.join("cmsis/cm4/core_support"),
        device_support.clone(),
        root.join("drivers/inc"),
    ]);
    host.append_defines(&[Define::flag("USE_STDPERIPH_DRIVER")]);

    if board.build.ldscript.is_none() {
        if let Some(ld) = linker_script(board, framework_dir) {
            host.set_linker_script(ld);
        }
    }

    host.register_static_library(
        "cmsis",
        &device_support,
        &[
            "+<*.c>".to_string(),
            format!(
                "+<startup/gcc/startup_{}.S>",
                board.build.bsp.to_lowercase()
            ),
        ],
    );
    host.register_static_library(
        "driver",
        &root.join("drivers/src"),
        &["+<*.c>".to_string()],
    );
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaticLibrary {
    pub name: String,
    pub source_dir: PathBuf,
    pub filter: Vec<String>,
}

/// A [`BuildHost`] that just writes everything down.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BuildPlan {
    pub flags: FlagPreset,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<Define>,
    pub linker_script: Option<PathBuf>,
    pub libraries: Vec<StaticLibrary>,
}

impl BuildHost for BuildPlan {
    fn append_flags(&mut self, flags: &FlagPreset) {
        self.flags.extend(flags);
    }

    fn append_include_dirs(&mut self, dirs: &[PathBuf]) {
        self.include_dirs.extend(dirs.iter().cloned());
    }

    fn append_defines(&mut self, defines: &[Define]) {
        self.defines.extend(defines.iter().cloned());
    }

    fn set_linker_script(&mut self, path: PathBuf) {
        self.linker_script = Some(path);
    }

    fn register_static_library(
        &mut self,
        name: &str,
        source_dir: &Path,
        filter: &[String],
    ) {
        self.libraries.push(StaticLibrary {
            name: name.to_string(),
            source_dir: source_dir.to_path_buf(),
            filter: filter.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::at32f437;
    use std::fs;

    /// Lays out an empty copy of the firmware library for the AT32F435/437
    /// group, optionally with its linker script.
    fn framework(with_ldscript: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let linker = dir.path().join(
            "AT32F435_437_Firmware_Library/libraries/cmsis/cm4/device_support/startup/gcc/linker",
        );
        fs::create_dir_all(&linker).unwrap();
        if with_ldscript {
            fs::write(linker.join("AT32F437XM_FLASH.ld"), "").unwrap();
        }
        dir
    }

    #[test]
    fn registers_library_sources() {
        let fw = framework(true);
        let mut plan = BuildPlan::default();
        configure(&mut plan, &at32f437(), fw.path(), Path::new("build"))
            .unwrap();

        let root = fw.path().join("AT32F435_437_Firmware_Library/libraries");
        assert_eq!(
            plan.include_dirs,
            [
                root.join("cmsis/cm4/core_support"),
                root.join("cmsis/cm4/device_support"),
                root.join("drivers/inc"),
            ]
        );
        assert_eq!(plan.defines, [Define::flag("USE_STDPERIPH_DRIVER")]);
        assert_eq!(
            plan.linker_script,
            Some(
                root.join("cmsis/cm4/device_support/startup/gcc/linker")
                    .join("AT32F437XM_FLASH.ld")
            )
        );
        assert_eq!(
            plan.libraries,
            [
                StaticLibrary {
                    name: "cmsis".into(),
                    source_dir: root.join("cmsis/cm4/device_support"),
                    filter: vec![
                        "+<*.c>".into(),
                        "+<startup/gcc/startup_at32f435_437.S>".into()
                    ],
                },
                StaticLibrary {
                    name: "driver".into(),
                    source_dir: root.join("drivers/src"),
                    filter: vec!["+<*.c>".into()],
                },
            ]
        );
        assert!(plan.flags.ccflags.contains(&"-mcpu=cortex-m4".to_string()));
    }

    #[test]
    fn missing_linker_script_is_not_fatal() {
        let fw = framework(false);
        let mut plan = BuildPlan::default();
        configure(&mut plan, &at32f437(), fw.path(), Path::new("build"))
            .unwrap();
        assert_eq!(plan.linker_script, None);
        assert_eq!(plan.libraries.len(), 2);
    }

    #[test]
    fn board_linker_script_wins() {
        let fw = framework(true);
        let mut board = at32f437();
        board.build.ldscript = Some("custom.ld".into());
        let mut plan = BuildPlan::default();
        configure(&mut plan, &board, fw.path(), Path::new("build")).unwrap();
        assert_eq!(plan.linker_script, None);
    }

    #[test]
    fn missing_framework_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = BuildPlan::default();
        let err = configure(
            &mut plan,
            &at32f437(),
            &dir.path().join("nope"),
            Path::new("build"),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlatformError>(),
            Some(PlatformError::MissingFramework(_))
        ));
        assert!(plan.libraries.is_empty());
    }

    #[test]
    fn host_can_be_a_trait_object() {
        let fw = framework(true);
        let mut plan = BuildPlan::default();
        let host: &mut dyn BuildHost = &mut plan;
        configure(host, &at32f437(), fw.path(), Path::new("build")).unwrap();
        assert!(plan.linker_script.is_some());
    }
}
