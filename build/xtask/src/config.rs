// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use build_platform::{debug_tools, firmlib, ToolCommand};

pub const FILE_NAME: &str = "xtask.toml";

/// Placeholder in `custom-upload` that is replaced with the firmware image.
pub const SOURCE: &str = "$SOURCE";

const DFU_UTIL_PACKAGE: &str = "tool-dfuutil";

/// Local tool locations, read from an optional `xtask.toml` at the root of
/// the workspace. Anything left out falls back to `<root>/packages/<name>` or
/// `<root>/target/firmware`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub openocd_dir: Option<PathBuf>,
    #[serde(default)]
    pub dfu_util_dir: Option<PathBuf>,
    #[serde(default)]
    pub framework_dir: Option<PathBuf>,
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
    /// Program and arguments run for the `custom` upload protocol.
    #[serde(default)]
    pub custom_upload: Vec<String>,

    #[serde(skip)]
    root: PathBuf,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(FILE_NAME);
        if !path.is_file() {
            log::debug!("no {}; using defaults", path.display());
            return Ok(Self {
                root: root.to_path_buf(),
                ..Self::default()
            });
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(root, &text)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml(root: &Path, text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        config.root = root.to_path_buf();
        Ok(config)
    }

    fn package(&self, dir: &Option<PathBuf>, name: &str) -> PathBuf {
        match dir {
            Some(d) => self.root.join(d),
            None => self.root.join("packages").join(name),
        }
    }

    pub fn openocd_dir(&self) -> PathBuf {
        self.package(&self.openocd_dir, debug_tools::OPENOCD_PACKAGE)
    }

    pub fn dfu_util_dir(&self) -> PathBuf {
        self.package(&self.dfu_util_dir, DFU_UTIL_PACKAGE)
    }

    pub fn framework_dir(&self) -> PathBuf {
        self.package(&self.framework_dir, firmlib::PACKAGE)
    }

    pub fn build_dir(&self) -> PathBuf {
        match &self.build_dir {
            Some(d) => self.root.join(d),
            None => self.root.join("target").join("firmware"),
        }
    }

    /// The `custom-upload` command with `$SOURCE` filled in.
    pub fn custom_upload(&self, image: &Path) -> Result<ToolCommand> {
        let Some((program, args)) = self.custom_upload.split_first() else {
            bail!("protocol `custom` needs custom-upload in {FILE_NAME}");
        };
        let image = image.display().to_string();
        let args = args.iter().map(|a| a.replace(SOURCE, &image));
        Ok(ToolCommand::new(program).args(args))
    }
}
