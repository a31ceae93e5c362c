// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use build_platform::debug_tools::add_default_debug_tools;
use build_platform::firmlib::{self, BuildPlan};
use build_platform::packages::{self, ProjectOptions};
use build_platform::toolchain::{deprecated_ldscript_flags, FlagPreset};
use build_platform::upload::Artifacts;
use build_platform::Board;

mod config;
mod image;
mod upload;

use config::Config;

#[derive(Debug, Parser)]
#[clap(max_term_width = 80, about = "extra tasks for working on AT32 boards")]
enum Xtask {
    /// Regenerates the board descriptors from the parts catalog.
    Boards,

    /// Prints the bare-metal compiler and linker flags for a board.
    Flags {
        /// Path to the board descriptor, in JSON.
        board: PathBuf,
        /// Where the link map goes; defaults to `build-dir` from xtask.toml.
        #[clap(long)]
        build_dir: Option<PathBuf>,
        /// Extra link flags from the project, checked for linker scripts
        /// passed by hand.
        #[clap(long = "link-flag", allow_hyphen_values = true)]
        link_flags: Vec<String>,
    },

    /// Prints what building against the firmware library would set up.
    Plan {
        /// Path to the board descriptor, in JSON.
        board: PathBuf,
        #[clap(long)]
        framework_dir: Option<PathBuf>,
        #[clap(long)]
        build_dir: Option<PathBuf>,
    },

    /// Prints the board's debug tools, including the OpenOCD defaults.
    DebugTools {
        /// Path to the board descriptor, in JSON.
        board: PathBuf,
    },

    /// Prints the packages a project needs.
    Packages {
        /// Path to the board descriptor, in JSON.
        board: Option<PathBuf>,
        #[clap(long)]
        upload_protocol: Option<String>,
        #[clap(long)]
        debug_tool: Option<String>,
    },

    /// Uploads a firmware image to an attached board.
    Upload {
        /// Path to the board descriptor, in JSON.
        board: PathBuf,
        #[clap(long)]
        elf: PathBuf,
        #[clap(long)]
        bin: PathBuf,
        /// Defaults to the board's `upload.protocol`.
        #[clap(long)]
        protocol: Option<String>,
        /// Print the commands instead of running them.
        #[clap(long)]
        dry_run: bool,
        /// Request verbosity from tools we shell out to.
        #[clap(short)]
        verbose: bool,
    },

    /// Writes the BIN, HEX, disassembly and symbol listing for an ELF.
    Image { elf: PathBuf },

    /// Reports flash and RAM used by an ELF.
    Size {
        elf: PathBuf,
        /// Board descriptor to report usage against.
        #[clap(long)]
        board: Option<PathBuf>,
    },
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn main() -> Result<()> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");

    env_logger::init_from_env(env);

    run(Xtask::parse(), &workspace_root())
}

/// `xtask.toml` under `root` is only read by subcommands that need it.
fn run(xtask: Xtask, root: &Path) -> Result<()> {
    let config = || Config::load(root);

    match xtask {
        Xtask::Boards => {
            build_boardgen::Generator::fixed().run()?;
        }
        Xtask::Flags {
            board,
            build_dir,
            link_flags,
        } => {
            let board = Board::from_file(&board)?;
            let build_dir = match build_dir {
                Some(d) => d,
                None => config()?.build_dir(),
            };
            let mut flags = FlagPreset::bare_metal(&board, &build_dir);
            for f in deprecated_ldscript_flags(&link_flags) {
                log::warn!(
                    "`{f}`: set build.ldscript in the board descriptor \
                     instead of passing a linker script in link flags"
                );
            }
            flags.linkflags.extend(link_flags);
            print_json(&flags)?;
        }
        Xtask::Plan {
            board,
            framework_dir,
            build_dir,
        } => {
            let board = Board::from_file(&board)?;
            let (framework_dir, build_dir) = match (framework_dir, build_dir) {
                (Some(f), Some(b)) => (f, b),
                (f, b) => {
                    let c = config()?;
                    (
                        f.unwrap_or_else(|| c.framework_dir()),
                        b.unwrap_or_else(|| c.build_dir()),
                    )
                }
            };
            let mut plan = BuildPlan::default();
            firmlib::configure(&mut plan, &board, &framework_dir, &build_dir)?;
            print_json(&plan)?;
        }
        Xtask::DebugTools { board } => {
            let mut board = Board::from_file(&board)?;
            add_default_debug_tools(&mut board)?;
            print_json(&board.debug.tools)?;
        }
        Xtask::Packages {
            board,
            upload_protocol,
            debug_tool,
        } => {
            let board = board.as_deref().map(Board::from_file).transpose()?;
            let options = ProjectOptions {
                upload_protocol,
                debug_tool,
            };
            let mut all = packages::all();
            packages::prune(&mut all, board.as_ref(), &options);
            print_json(&all)?;
        }
        Xtask::Upload {
            board,
            elf,
            bin,
            protocol,
            dry_run,
            verbose,
        } => {
            let artifacts = Artifacts { elf, bin };
            upload::run(
                &config()?,
                &board,
                &artifacts,
                protocol.as_deref(),
                dry_run,
                verbose,
            )?;
        }
        Xtask::Image { elf } => {
            image::convert(&elf)?;
        }
        Xtask::Size { elf, board } => {
            image::size(&elf, board.as_deref())?;
        }
    }

    Ok(())
}
