// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GNU Arm toolchain flags and post-link image conversion.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::{Board, ToolCommand};

/// Names of the cross tools, sharing a common prefix.
#[derive(Clone, Debug)]
pub struct Toolchain {
    prefix: String,
}

impl Toolchain {
    pub fn arm_none_eabi() -> Self {
        Self {
            prefix: "arm-none-eabi-".to_string(),
        }
    }

    pub fn tool(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// `firmware.elf` → `firmware.bin`
    pub fn elf_to_bin(&self, elf: &Path, bin: &Path) -> ToolCommand {
        ToolCommand::new(self.tool("objcopy"))
            .args(["-O", "binary"])
            .path_arg(elf)
            .path_arg(bin)
    }

    /// `firmware.elf` → `firmware.hex`, leaving out any EEPROM section.
    pub fn elf_to_hex(&self, elf: &Path, hex: &Path) -> ToolCommand {
        ToolCommand::new(self.tool("objcopy"))
            .args(["-O", "ihex", "-R", ".eeprom"])
            .path_arg(elf)
            .path_arg(hex)
    }

    pub fn disassemble(&self, elf: &Path, asm: &Path) -> ToolCommand {
        ToolCommand::new(self.tool("objdump"))
            .args(["-d", "-S"])
            .path_arg(elf)
            .stdout_to(asm)
    }

    /// Global symbols, smallest first, with their sizes.
    pub fn export_symbols(&self, elf: &Path, out: &Path) -> ToolCommand {
        ToolCommand::new(self.tool("nm"))
            .args(["--print-size", "--size-sort", "-gC"])
            .path_arg(elf)
            .stdout_to(out)
    }

    /// Per-section sizes in the System V format that [`SizeReport`] reads.
    pub fn section_sizes(&self, elf: &Path) -> ToolCommand {
        ToolCommand::new(self.tool("size"))
            .args(["-A", "-d"])
            .path_arg(elf)
    }
}

/// A preprocessor definition, `NAME` or `NAME=value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
}

impl Define {
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={v}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Serialize for Define {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlagPreset {
    pub asflags: Vec<String>,
    pub ccflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub cppdefines: Vec<Define>,
    pub linkflags: Vec<String>,
    pub libs: Vec<String>,
}

fn strings(s: &[&str]) -> Vec<String> {
    s.iter().map(|s| s.to_string()).collect()
}

impl FlagPreset {
    /// Flags for bare-metal Cortex-M4 code, with no framework layered on top.
    pub fn bare_metal(board: &Board, build_dir: &Path) -> Self {
        let ccflags = strings(&[
            "-Os",
            "-ffunction-sections",
            "-fdata-sections",
            "-Wall",
            "-mthumb",
            "-mcpu=cortex-m4",
            // Keeps preprocessed and assembly output next to the objects.
            "-save-temps=obj",
        ]);

        let mut asflags = strings(&["-x", "assembler-with-cpp"]);
        asflags.extend(ccflags.iter().cloned());

        let mut cppdefines = vec![Define::value("F_CPU", &board.build.f_cpu)];
        if !board.build.variant.is_empty() {
            cppdefines.push(Define::flag(board.build.variant.to_uppercase()));
        }

        let mut linkflags = strings(&[
            "-Os",
            "-Wl,--gc-sections,--relax",
            "--specs=nano.specs",
            "--specs=nosys.specs",
            "-mthumb",
            "-mcpu=cortex-m4",
        ]);
        linkflags.push(format!(
            "-Wl,-Map,{}",
            build_dir.join("linkmap.map").display()
        ));

        Self {
            asflags,
            ccflags,
            cxxflags: strings(&["-fno-rtti", "-fno-exceptions"]),
            cppdefines,
            linkflags,
            libs: strings(&["c", "gcc", "m", "stdc++"]),
        }
    }

    pub fn extend(&mut self, other: &FlagPreset) {
        self.asflags.extend(other.asflags.iter().cloned());
        self.ccflags.extend(other.ccflags.iter().cloned());
        self.cxxflags.extend(other.cxxflags.iter().cloned());
        self.cppdefines.extend(other.cppdefines.iter().cloned());
        self.linkflags.extend(other.linkflags.iter().cloned());
        self.libs.extend(other.libs.iter().cloned());
    }
}

/// Link flags that pass a linker script directly. The linker script should
/// come from the board (`build.ldscript`) or the firmware library instead.
pub fn deprecated_ldscript_flags(linkflags: &[String]) -> Vec<&str> {
    linkflags
        .iter()
        .filter(|f| f.contains("-Wl,-T"))
        .map(|f| f.as_str())
        .collect()
}

/// Totals from `size -A -d`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SizeReport {
    /// Bytes of flash: code, read-only data, and initialized data images.
    pub program: u64,
    /// Bytes of RAM used statically.
    pub data: u64,
}

impl SizeReport {
    pub fn parse(text: &str) -> Self {
        let program = Regex::new(
            r"(?m)^(?:\.isr_vector|\.text|\.data|\.rodata|\.text\.align|\.init_array|\.fini_array|\.ARM\.exidx)\s+(\d+)",
        )
        .expect("program regex is valid");
        let data = Regex::new(r"(?m)^(?:\.data|\.bss|\.noinit)\s+(\d+)")
            .expect("data regex is valid");

        let sum = |re: &Regex| -> u64 {
            re.captures_iter(text)
                .filter_map(|c| c[1].parse::<u64>().ok())
                .sum()
        };
        Self {
            program: sum(&program),
            data: sum(&data),
        }
    }

    /// Usage as a percentage of the board's flash and RAM.
    pub fn usage(&self, board: &Board) -> (f64, f64) {
        let pct = |used: u64, total: u64| {
            if total == 0 {
                0.0
            } else {
                used as f64 * 100.0 / total as f64
            }
        };
        (
            pct(self.program, board.upload.maximum_size),
            pct(self.data, board.upload.maximum_ram_size),
        )
    }
}
