// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parts catalog loading.
//!
//! The catalog is a comma-separated table whose header row names the columns.
//! A handful of columns are required (see [`REQUIRED_COLUMNS`]); every column,
//! required or not, is kept around so that the template can refer to it by its
//! header name.

use std::io::Read;

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::GenError;

pub const PRODUCT: &str = "Product";
pub const SKU: &str = "SKU";
pub const SPEED: &str = "Speed";
pub const FLASH: &str = "Flash";
pub const SRAM: &str = "SRAM";

pub const REQUIRED_COLUMNS: [&str; 5] = [PRODUCT, SKU, SPEED, FLASH, SRAM];

/// One row of the parts catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartRecord {
    /// Line number of this row in the catalog (the header is line 1).
    pub line: usize,
    pub product: String,
    /// Full part number, exactly as it appears in the catalog.
    pub sku: String,
    pub speed_mhz: u32,
    pub flash_kb: u32,
    pub sram_spec: String,
    /// Every column of the row, keyed by header name, in header order.
    pub fields: IndexMap<String, String>,
}

impl PartRecord {
    pub fn from_fields(
        line: usize,
        fields: IndexMap<String, String>,
    ) -> Result<Self, GenError> {
        let sku = fields.get(SKU).cloned().unwrap_or_default();
        let err = |reason: String| GenError::InputFormat {
            line,
            sku: sku.clone(),
            reason,
        };

        for name in REQUIRED_COLUMNS {
            column(&fields, name).map_err(err)?;
        }
        let product = column(&fields, PRODUCT).map_err(err)?.to_string();
        if sku.contains(['/', '\\']) {
            return Err(err("SKU must not contain a path separator".into()));
        }

        let number = |name: &str| -> Result<u32, GenError> {
            let text = column(&fields, name).map_err(err)?;
            text.parse().map_err(|_| {
                err(format!("`{name}` must be an integer, found {text:?}"))
            })
        };
        let speed_mhz = number(SPEED)?;
        let flash_kb = number(FLASH)?;
        let sram_spec = column(&fields, SRAM).map_err(err)?.to_string();

        Ok(Self {
            line,
            product,
            sku: sku.clone(),
            speed_mhz,
            flash_kb,
            sram_spec,
            fields,
        })
    }

    /// The SKU with any packaging suffix (everything from the first `-`)
    /// removed. Used when inspecting SKU marker characters; never used for
    /// naming outputs.
    pub fn base_sku(&self) -> &str {
        self.sku.split('-').next().unwrap_or(&self.sku)
    }
}

fn column<'a>(
    fields: &'a IndexMap<String, String>,
    name: &str,
) -> Result<&'a str, String> {
    match fields.get(name).map(|s| s.as_str()) {
        Some("") => Err(format!("column `{name}` is empty")),
        Some(v) => Ok(v),
        None => Err(format!("missing column `{name}`")),
    }
}

/// Reads every row of a catalog, stopping at the first malformed one.
pub fn read_catalog<R: Read>(source: R) -> Result<Vec<PartRecord>> {
    records(source)?.collect()
}

/// Reads the header, then yields one row at a time. A row is only read once
/// the caller is done with the previous one.
pub fn records<R: Read>(
    source: R,
) -> Result<impl Iterator<Item = Result<PartRecord>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .context("failed to read catalog header")?
        .clone();

    Ok(reader.into_records().enumerate().map(move |(i, record)| {
        let record = record.context("failed to read catalog row")?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 2);
        let fields: IndexMap<String, String> = record
            .deserialize(Some(&headers))
            .with_context(|| format!("catalog line {line} is malformed"))?;
        Ok(PartRecord::from_fields(line, fields)?)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn reads_rows_with_passthrough_columns() {
        let parts = read_catalog(
            indoc! {"
                Product,SKU,Package,Speed,Flash,SRAM
                AT32F437,AT32F437ZMT7,LQFP144,288,4032,384+128
                AT32F421,AT32F421C8T7,LQFP48,120,64,16
            "}
            .as_bytes(),
        )
        .unwrap();

        assert_eq!(parts.len(), 2);
        let p = &parts[0];
        assert_eq!(p.line, 2);
        assert_eq!(p.product, "AT32F437");
        assert_eq!(p.sku, "AT32F437ZMT7");
        assert_eq!(p.speed_mhz, 288);
        assert_eq!(p.flash_kb, 4032);
        assert_eq!(p.sram_spec, "384+128");
        assert_eq!(p.fields["Package"], "LQFP144");
        assert_eq!(
            p.fields.keys().collect::<Vec<_>>(),
            ["Product", "SKU", "Package", "Speed", "Flash", "SRAM"]
        );
        assert_eq!(parts[1].line, 3);
    }

    #[test]
    fn whitespace_around_cells_is_ignored() {
        let parts = read_catalog(
            "Product, SKU, Speed, Flash, SRAM\nAT32F425 , AT32F425R8T7, 96, 64 , 20\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(parts[0].product, "AT32F425");
        assert_eq!(parts[0].flash_kb, 64);
    }

    #[test]
    fn non_numeric_speed_is_fatal() {
        let err = read_catalog(
            indoc! {"
                Product,SKU,Speed,Flash,SRAM
                AT32F421,AT32F421C8T7,fast,64,16
            "}
            .as_bytes(),
        )
        .unwrap_err();
        match err.downcast_ref::<GenError>() {
            Some(GenError::InputFormat { line, sku, reason }) => {
                assert_eq!(*line, 2);
                assert_eq!(sku, "AT32F421C8T7");
                assert!(reason.contains("Speed"), "{reason}");
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let err = read_catalog(
            "Product,SKU,Speed,SRAM\nAT32F421,AT32F421C8T7,120,16\n".as_bytes(),
        )
        .unwrap_err();
        let err = err.downcast::<GenError>().unwrap();
        assert!(err.to_string().contains("missing column `Flash`"));
    }

    #[test]
    fn ragged_row_is_fatal() {
        assert!(read_catalog(
            "Product,SKU,Speed,Flash,SRAM\nAT32F421,AT32F421C8T7,120\n"
                .as_bytes()
        )
        .is_err());
    }

    #[test]
    fn sku_with_path_separator_is_rejected() {
        let err = read_catalog(
            "Product,SKU,Speed,Flash,SRAM\nAT32F421,../AT32F421,120,64,16\n"
                .as_bytes(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GenError>(),
            Some(GenError::InputFormat { .. })
        ));
    }

    #[test]
    fn rows_are_read_lazily() {
        let mut rows = records(
            indoc! {"
                Product,SKU,Speed,Flash,SRAM
                AT32F421,AT32F421C8T7,120,64,16
                AT32F421,AT32F421K8U7,slow,64,16
            "}
            .as_bytes(),
        )
        .unwrap();
        assert_eq!(rows.next().unwrap().unwrap().sku, "AT32F421C8T7");
        assert!(rows.next().unwrap().is_err());
        assert!(rows.next().is_none());
    }

    #[test]
    fn base_sku_drops_packaging_suffix() {
        let parts = read_catalog(
            "Product,SKU,Speed,Flash,SRAM\nAT32WB415,AT32WB415CCU7-7,150,256,32\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(parts[0].sku, "AT32WB415CCU7-7");
        assert_eq!(parts[0].base_sku(), "AT32WB415CCU7");
    }
}
