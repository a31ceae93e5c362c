// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tool and framework packages a project may need.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Board;

pub const JLINK: &str = "tool-jlink";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    Toolchain,
    Framework,
    Uploader,
    Debugger,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Package {
    #[serde(rename = "type")]
    pub kind: PackageKind,
    #[serde(default)]
    pub optional: bool,
}

/// Every package this platform knows about.
pub fn all() -> IndexMap<String, Package> {
    use PackageKind::*;
    [
        ("toolchain-gccarmnoneeabi", Toolchain, false),
        (crate::firmlib::PACKAGE, Framework, true),
        (crate::debug_tools::OPENOCD_PACKAGE, Uploader, true),
        (JLINK, Uploader, true),
        ("tool-dfuutil", Uploader, true),
    ]
    .into_iter()
    .map(|(name, kind, optional)| (name.to_string(), Package { kind, optional }))
    .collect()
}

/// Project-level choices that influence which packages are needed.
#[derive(Clone, Debug, Default)]
pub struct ProjectOptions {
    pub upload_protocol: Option<String>,
    pub debug_tool: Option<String>,
}

/// Drops the J-Link package unless the project or board asks for J-Link.
pub fn prune(
    packages: &mut IndexMap<String, Package>,
    board: Option<&Board>,
    options: &ProjectOptions,
) {
    fn mentions(s: Option<&str>) -> bool {
        s.map_or(false, |s| s.contains("jlink"))
    }

    let mut wanted = mentions(options.upload_protocol.as_deref())
        || mentions(options.debug_tool.as_deref());
    if let Some(b) = board {
        wanted |= b.debug.default_tools.iter().any(|t| mentions(Some(t.as_str())))
            || mentions(b.upload.protocol.as_deref());
    }

    if !wanted {
        packages.shift_remove(JLINK);
    }
}
