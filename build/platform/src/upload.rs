// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Picks the programmer for an upload protocol and builds its command line.

use std::path::{Path, PathBuf};

use log::warn;

use crate::{Board, PlatformError, ToolCommand};

/// Vendor and product ID of the AT32 ROM DFU bootloader.
pub const DEFAULT_HWIDS: (&str, &str) = ("0x2E3C", "0xDF11");

pub const DEFAULT_DFU_ADDRESS: &str = "0x08000000";

/// Where the programmer packages live on this machine.
#[derive(Clone, Debug)]
pub struct ToolPaths {
    pub openocd_dir: PathBuf,
    pub dfu_util_dir: PathBuf,
    /// Host identifier used in package layouts, e.g. `linux_x86_64`.
    pub systype: String,
    pub windows: bool,
}

impl ToolPaths {
    pub fn for_host(openocd_dir: PathBuf, dfu_util_dir: PathBuf) -> Self {
        Self {
            openocd_dir,
            dfu_util_dir,
            systype: host_systype(),
            windows: cfg!(windows),
        }
    }

    fn openocd(&self) -> PathBuf {
        let exe = if self.windows { "openocd.exe" } else { "openocd" };
        self.openocd_dir
            .join(format!("bin-{}", self.systype))
            .join(exe)
    }
}

pub fn host_systype() -> String {
    use std::env::consts::{ARCH, OS};
    let os = match OS {
        "macos" => "darwin",
        os => os,
    };
    let arch = match (OS, ARCH) {
        ("windows", "x86_64") => "amd64",
        ("windows", "x86") => "x86",
        (_, arch) => arch,
    };
    format!("{os}_{arch}")
}

/// Build outputs an upload may use.
#[derive(Clone, Debug)]
pub struct Artifacts {
    pub elf: PathBuf,
    pub bin: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadPlan {
    /// Program through an OpenOCD debug server.
    OpenOcd { command: ToolCommand, image: PathBuf },
    /// Program over USB through the ROM bootloader. `suffix` stamps the DFU
    /// suffix onto the image and has to run first.
    Dfu {
        suffix: ToolCommand,
        command: ToolCommand,
        image: PathBuf,
    },
    /// The user supplies the upload command.
    Custom,
    /// Nothing we know how to drive.
    Unknown { protocol: String },
}

impl UploadPlan {
    /// `board` should already have its default debug tools filled in (see
    /// [`crate::debug_tools::add_default_debug_tools`]).
    pub fn for_protocol(
        protocol: &str,
        board: &Board,
        tools: &ToolPaths,
        artifacts: &Artifacts,
        verbose: bool,
    ) -> Result<Self, PlatformError> {
        if let Some(tool) = board.debug.tools.get(protocol) {
            let server = tool.server.as_ref().ok_or_else(|| {
                PlatformError::NoDebugServer {
                    board: board.id.clone(),
                    tool: protocol.to_string(),
                }
            })?;
            return Ok(openocd(board, server, tools, artifacts, verbose));
        }

        Ok(match protocol {
            "dfu" => dfu(board, tools, &artifacts.bin),
            "custom" => UploadPlan::Custom,
            _ => {
                warn!("unknown upload protocol {protocol}");
                UploadPlan::Unknown {
                    protocol: protocol.to_string(),
                }
            }
        })
    }

    /// Commands to run, in order.
    pub fn commands(&self) -> Vec<&ToolCommand> {
        match self {
            UploadPlan::OpenOcd { command, .. } => vec![command],
            UploadPlan::Dfu {
                suffix, command, ..
            } => vec![suffix, command],
            UploadPlan::Custom | UploadPlan::Unknown { .. } => vec![],
        }
    }

    pub fn image(&self) -> Option<&Path> {
        match self {
            UploadPlan::OpenOcd { image, .. } | UploadPlan::Dfu { image, .. } => {
                Some(image)
            }
            UploadPlan::Custom | UploadPlan::Unknown { .. } => None,
        }
    }
}

fn openocd(
    board: &Board,
    server: &crate::board::DebugServer,
    tools: &ToolPaths,
    artifacts: &Artifacts,
    verbose: bool,
) -> UploadPlan {
    // Without an offset the ELF carries its own load addresses.
    let offset = board.upload.offset_address.as_deref();
    let image = match offset {
        Some(_) => artifacts.bin.clone(),
        None => artifacts.elf.clone(),
    };

    let package_dir = tools.openocd_dir.display().to_string();
    let mut args = vec![if verbose { "-d2" } else { "-d1" }.to_string()];
    args.extend(server.arguments.iter().cloned());
    args.push("-c".into());
    args.push(format!(
        "program {{{}}} {} verify reset; shutdown;",
        image.display(),
        offset.unwrap_or("")
    ));
    let args = args
        .into_iter()
        .map(|a| a.replace("$PACKAGE_DIR", &package_dir));

    UploadPlan::OpenOcd {
        command: ToolCommand::new(tools.openocd()).args(args),
        image,
    }
}

fn dfu(board: &Board, tools: &ToolPaths, bin: &Path) -> UploadPlan {
    let hwids = match &board.build.hwids {
        Some(h) if !h.is_empty() => h.clone(),
        _ => vec![(DEFAULT_HWIDS.0.to_string(), DEFAULT_HWIDS.1.to_string())],
    };
    let (vid, pid) = &hwids[0];
    let devices = hwids
        .iter()
        .map(|(v, p)| format!("{v}:{p}"))
        .collect::<Vec<_>>()
        .join(",");
    let address = board
        .upload
        .offset_address
        .as_deref()
        .unwrap_or(DEFAULT_DFU_ADDRESS);

    let bin_dir = tools.dfu_util_dir.join("bin");
    let suffix = ToolCommand::new(bin_dir.join("dfu-suffix"))
        .args(["-v", vid.as_str(), "-p", pid.as_str(), "-d", "0xffff", "-a"])
        .path_arg(bin);
    let command = ToolCommand::new(bin_dir.join("dfu-util"))
        .arg("-d")
        .arg(devices)
        .args(["-a", "0", "-s"])
        .arg(format!("{address}:leave"))
        .arg("-D")
        .path_arg(bin);

    UploadPlan::Dfu {
        suffix,
        command,
        image: bin.to_path_buf(),
    }
}
