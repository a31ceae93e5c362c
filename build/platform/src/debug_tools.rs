// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::board::{DebugServer, DebugTool};
use crate::{Board, PlatformError};

/// Debug probes that are driven through the AT32 OpenOCD fork.
pub const OPENOCD_LINKS: [&str; 3] = ["cmsis-dap", "atlink", "atlink_dap_v2"];

pub const OPENOCD_PACKAGE: &str = "tool-openocd-at32";

/// Fills in an OpenOCD debug tool for every supported probe the board can be
/// uploaded with, leaving tools the descriptor already defines alone.
pub fn add_default_debug_tools(board: &mut Board) -> Result<(), PlatformError> {
    for link in OPENOCD_LINKS {
        if !board.upload.protocols.iter().any(|p| p == link)
            || board.debug.tools.contains_key(link)
        {
            continue;
        }

        let debug = &board.debug;
        let mut arguments = vec!["-s".to_string(), "$PACKAGE_DIR/scripts".into()];
        if let Some(b) = &debug.openocd_board {
            arguments.extend(["-f".into(), format!("board/{b}.cfg")]);
        } else {
            let target = debug.openocd_target.as_ref().ok_or_else(|| {
                PlatformError::MissingOpenOcdTarget {
                    board: board.id.clone(),
                }
            })?;
            arguments.extend([
                "-f".into(),
                format!("interface/{link}.cfg"),
                "-c".into(),
                "transport select swd".into(),
                "-f".into(),
                format!("target/{target}.cfg"),
            ]);
            arguments.extend(debug.openocd_extra_args.iter().cloned());
        }

        let tool = DebugTool {
            server: Some(DebugServer {
                package: Some(OPENOCD_PACKAGE.to_string()),
                executable: "bin/openocd".to_string(),
                arguments,
            }),
            onboard: debug.onboard_tools.iter().any(|t| t == link),
            default: debug.default_tools.iter().any(|t| t == link),
        };
        board.debug.tools.insert(link.to_string(), tool);
    }
    Ok(())
}
