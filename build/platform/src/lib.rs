// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-time support for AT32 (Cortex-M4) boards.
//!
//! Nothing in here drives a build on its own. Each module computes what a
//! build needs for a given board descriptor (compiler flags, firmware library
//! sources, the command line for a programmer) and hands it either to a
//! [`firmlib::BuildHost`] or back to the caller as a [`ToolCommand`].

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde::Serialize;

pub mod board;
pub mod debug_tools;
pub mod firmlib;
pub mod packages;
pub mod toolchain;
pub mod upload;

pub use board::Board;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("board {board}: no OpenOCD board or target configured")]
    MissingOpenOcdTarget { board: String },
    #[error("board {board}: debug tool {tool} has no server")]
    NoDebugServer { board: String, tool: String },
    #[error("framework directory {} does not exist", .0.display())]
    MissingFramework(PathBuf),
    #[error("board {board}: cannot parse CPU frequency {value:?}")]
    BadCpuFrequency { board: String, value: String },
}

/// An external tool invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Where to send the tool's standard output, if not the terminal.
    pub stdout: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Runs the tool to completion, failing if it exits unsuccessfully.
    pub fn run(&self) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(path) = &self.stdout {
            let file = File::create(path).with_context(|| {
                format!("failed to create {}", path.display())
            })?;
            cmd.stdout(file);
        }

        log::debug!("running {self}");
        let status = cmd
            .status()
            .with_context(|| format!("failed to run ({self})"))?;
        if !status.success() {
            bail!("command ({self}) failed; see output");
        }
        Ok(())
    }

    /// Runs the tool and returns what it printed.
    pub fn output(&self) -> Result<String> {
        log::debug!("running {self}");
        let out = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("failed to run ({self})"))?;
        if !out.status.success() {
            bail!(
                "command ({self}) failed: {}",
                String::from_utf8_lossy(&out.stderr)
            );
        }
        Ok(String::from_utf8(out.stdout)?)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for a in &self.args {
            if a.is_empty() || a.contains(char::is_whitespace) {
                write!(f, " {a:?}")?;
            } else {
                write!(f, " {a}")?;
            }
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}
