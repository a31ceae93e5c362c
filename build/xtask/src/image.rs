// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::Result;

use build_platform::toolchain::{SizeReport, Toolchain};
use build_platform::{Board, ToolCommand};

/// Everything we derive from a linked ELF, in the order it gets written.
pub fn conversions(elf: &Path) -> Vec<(PathBuf, ToolCommand)> {
    let tc = Toolchain::arm_none_eabi();
    let bin = elf.with_extension("bin");
    let hex = elf.with_extension("hex");
    let asm = elf.with_extension("asm");
    let symbols = elf.with_extension("symbols.txt");
    vec![
        (bin.clone(), tc.elf_to_bin(elf, &bin)),
        (hex.clone(), tc.elf_to_hex(elf, &hex)),
        (asm.clone(), tc.disassemble(elf, &asm)),
        (symbols.clone(), tc.export_symbols(elf, &symbols)),
    ]
}

pub fn convert(elf: &Path) -> Result<()> {
    for (out, cmd) in conversions(elf) {
        cmd.run()?;
        log::info!("wrote {}", out.display());
    }
    Ok(())
}

pub fn size(elf: &Path, board: Option<&Path>) -> Result<()> {
    let text = Toolchain::arm_none_eabi().section_sizes(elf).output()?;
    let report = SizeReport::parse(&text);

    match board {
        Some(path) => {
            let board = Board::from_file(path)?;
            let (flash, ram) = report.usage(&board);
            println!(
                "RAM:   {ram:>5.1}% (used {} bytes from {} bytes)",
                report.data, board.upload.maximum_ram_size
            );
            println!(
                "Flash: {flash:>5.1}% (used {} bytes from {} bytes)",
                report.program, board.upload.maximum_size
            );
        }
        None => {
            println!("RAM:   {} bytes", report.data);
            println!("Flash: {} bytes", report.program);
        }
    }
    Ok(())
}
