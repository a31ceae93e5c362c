// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::PlatformError;

/// A board descriptor, as written by the board generator.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Board {
    /// Taken from the descriptor's file name rather than its contents.
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub build: BuildConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BuildConfig {
    pub bsp: String,
    #[serde(default)]
    pub core: String,
    pub cpu: String,
    #[serde(default)]
    pub extra_flags: String,
    /// Clock frequency as a C literal, e.g. `288000000L`.
    pub f_cpu: String,
    pub mcu: String,
    pub product_line: String,
    pub variant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldscript: Option<String>,
    /// USB vendor/product ID pairs for DFU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hwids: Option<Vec<(String, String)>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub default_tools: Vec<String>,
    #[serde(default)]
    pub onboard_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openocd_board: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openocd_target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub openocd_extra_args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svd_path: Option<String>,
    #[serde(default)]
    pub tools: IndexMap<String, DebugTool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DebugTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<DebugServer>,
    #[serde(default)]
    pub onboard: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DebugServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub maximum_ram_size: u64,
    #[serde(default)]
    pub maximum_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_address: Option<String>,
}

impl Board {
    pub fn from_json(id: &str, text: &str) -> Result<Self> {
        let mut board: Board = serde_json::from_str(text)
            .with_context(|| format!("failed to parse board {id}"))?;
        board.id = id.to_string();
        Ok(board)
    }

    /// Loads `<dir>/<id>.json`; the board ID is the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("bad board path {}", path.display()))?;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(id, &text)
    }

    /// The CPU clock in Hz, with any C integer suffix dropped.
    pub fn cpu_hz(&self) -> Result<u64, PlatformError> {
        let digits = self.build.f_cpu.trim_end_matches(['L', 'l', 'U', 'u']);
        digits
            .parse()
            .map_err(|_| PlatformError::BadCpuFrequency {
                board: self.id.clone(),
                value: self.build.f_cpu.clone(),
            })
    }
}
