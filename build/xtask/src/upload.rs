// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use anyhow::{bail, Result};

use build_platform::debug_tools::add_default_debug_tools;
use build_platform::upload::{Artifacts, ToolPaths, UploadPlan};
use build_platform::{Board, ToolCommand};

use crate::config::Config;

/// Works out the commands that upload `artifacts` to `board`. `None` means
/// the protocol is one we can't drive.
pub fn commands(
    config: &Config,
    board: &Path,
    artifacts: &Artifacts,
    protocol: Option<&str>,
    verbose: bool,
) -> Result<Option<Vec<ToolCommand>>> {
    let mut board = Board::from_file(board)?;
    add_default_debug_tools(&mut board)?;

    let protocol = match protocol.or(board.upload.protocol.as_deref()) {
        Some(p) => p.to_string(),
        None => bail!(
            "board {} has no default upload protocol; pass --protocol",
            board.id
        ),
    };

    let tools = ToolPaths::for_host(config.openocd_dir(), config.dfu_util_dir());
    let plan =
        UploadPlan::for_protocol(&protocol, &board, &tools, artifacts, verbose)?;
    if let Some(image) = plan.image() {
        log::info!("uploading {} over {protocol}", image.display());
    }
    Ok(match &plan {
        UploadPlan::Custom => Some(vec![config.custom_upload(&artifacts.bin)?]),
        UploadPlan::Unknown { .. } => None,
        _ => Some(plan.commands().into_iter().cloned().collect()),
    })
}

pub fn run(
    config: &Config,
    board: &Path,
    artifacts: &Artifacts,
    protocol: Option<&str>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let Some(commands) = commands(config, board, artifacts, protocol, verbose)?
    else {
        return Ok(());
    };
    for cmd in commands {
        if dry_run {
            println!("{cmd}");
        } else {
            log::info!("{cmd}");
            cmd.run()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(dir: &Path) -> std::path::PathBuf {
        let rendered = build_boardgen::Generator::fixed().render().unwrap();
        let name = build_boardgen::output_file_name("AT32F403ACGT7");
        let path = dir.join(&name);
        std::fs::write(&path, &rendered[&name]).unwrap();
        path
    }

    fn artifacts() -> Artifacts {
        Artifacts {
            elf: "fw.elf".into(),
            bin: "fw.bin".into(),
        }
    }

    #[test]
    fn defaults_to_board_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        let cmds =
            commands(&config, &board(dir.path()), &artifacts(), None, false)
                .unwrap()
                .unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(
            cmds[0].program,
            config
                .openocd_dir()
                .join(format!("bin-{}", build_platform::upload::host_systype()))
                .join(if cfg!(windows) { "openocd.exe" } else { "openocd" })
        );
        let openocd = config.openocd_dir().display().to_string();
        assert_eq!(cmds[0].args[2], format!("{openocd}/scripts"));
        assert!(cmds[0].args.contains(&"target/at32f403axx.cfg".to_string()));
    }

    #[test]
    fn dfu_runs_suffix_first() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        let cmds = commands(
            &config,
            &board(dir.path()),
            &artifacts(),
            Some("dfu"),
            false,
        )
        .unwrap()
        .unwrap();
        assert!(cmds[0].program.ends_with("bin/dfu-suffix"));
        assert!(cmds[1].program.ends_with("bin/dfu-util"));
    }

    #[test]
    fn custom_needs_a_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = board(dir.path());
        let config = Config::load(dir.path()).unwrap();
        assert!(
            commands(&config, &path, &artifacts(), Some("custom"), false)
                .is_err()
        );

        let config = Config::from_toml(
            dir.path(),
            r#"custom-upload = ["flasher", "$SOURCE"]"#,
        )
        .unwrap();
        let cmds =
            commands(&config, &path, &artifacts(), Some("custom"), false)
                .unwrap()
                .unwrap();
        assert_eq!(cmds[0].to_string(), "flasher fw.bin");
    }

    #[test]
    fn unknown_protocol_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        let path = board(dir.path());
        assert!(
            commands(&config, &path, &artifacts(), Some("stlink"), false)
                .unwrap()
                .is_none()
        );
        run(&config, &path, &artifacts(), Some("stlink"), false, false)
            .unwrap();
    }
}
