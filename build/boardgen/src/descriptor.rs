// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-part attribute derivation.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::catalog::PartRecord;
use crate::GenError;

/// BSP groups, and the product codes sharing each group's firmware library
/// layout.
pub const BSP_GROUPS: &[(&str, &[&str])] = &[
    ("AT32F403", &["AT32F403"]),
    ("AT32F403A_407", &["AT32F403A", "AT32F407"]),
    ("AT32F413", &["AT32F413"]),
    ("AT32F415", &["AT32F415"]),
    ("AT32F421", &["AT32F421"]),
    ("AT32F425", &["AT32F425"]),
    ("AT32F435_437", &["AT32F435", "AT32F437"]),
    ("AT32WB415", &["AT32WB415"]),
];

pub fn bsp_group(product: &str) -> Option<&'static str> {
    BSP_GROUPS
        .iter()
        .find(|(_, products)| products.contains(&product))
        .map(|(group, _)| *group)
}

/// Picks an OpenOCD target suffix by looking at a marker character in the
/// base SKU.
struct DebugTargetRule {
    products: &'static [&'static str],
    index: usize,
    marker: char,
    on_marker: &'static str,
    otherwise: &'static str,
}

const DEBUG_TARGET_RULES: &[DebugTargetRule] = &[DebugTargetRule {
    // The 4032 KB parts ("M" memory marker) have their own OpenOCD target.
    products: &["AT32F435", "AT32F437"],
    index: 9,
    marker: 'M',
    on_marker: "xM",
    otherwise: "xx",
}];

const DEFAULT_DEBUG_TARGET_SUFFIX: &str = "xx";

/// Names of the derived fields, as seen by the template.
pub const VARIANT: &str = "variant";
pub const CPU_FREQ_HZ: &str = "cpu_freq_hz";
pub const FLASH_SIZE_BYTES: &str = "flash_size_bytes";
pub const SRAM_OPTIONS_LABEL: &str = "sram_options_label";
pub const SRAM_SIZE_BYTES: &str = "sram_size_bytes";
pub const DEBUG_TARGET_NAME: &str = "debug_target_name";
pub const FLASH_SERIES_LABEL: &str = "flash_series_label";
pub const BSP_GROUP: &str = "bsp_group";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SramSpecError {
    #[error("empty SRAM size")]
    Empty,
    #[error("SRAM size {0:?} is not an integer")]
    NotANumber(String),
    #[error("SRAM size {0:?} overflows")]
    Overflow(String),
}

/// The candidate SRAM configurations of a part, in KiB.
///
/// Written as `/`-separated alternatives, each of which is either a plain size
/// or `base+extra`; the latter contributes both `base` and `base + extra`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SramOptions(Vec<u32>);

impl SramOptions {
    pub fn sizes_kb(&self) -> &[u32] {
        &self.0
    }

    pub fn max_kb(&self) -> u32 {
        // Never empty: parsing rejects empty specs.
        self.0.iter().copied().max().unwrap_or(0)
    }
}

impl FromStr for SramOptions {
    type Err = SramSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        fn kb(s: &str) -> Result<u32, SramSpecError> {
            let s = s.trim();
            if s.is_empty() {
                return Err(SramSpecError::Empty);
            }
            s.parse()
                .map_err(|_| SramSpecError::NotANumber(s.to_string()))
        }

        let mut sizes = vec![];
        for alt in spec.split('/') {
            match alt.split_once('+') {
                Some((base, extra)) => {
                    let base = kb(base)?;
                    let boosted = base
                        .checked_add(kb(extra)?)
                        .ok_or_else(|| SramSpecError::Overflow(alt.into()))?;
                    sizes.push(base);
                    sizes.push(boosted);
                }
                None => sizes.push(kb(alt)?),
            }
        }
        Ok(Self(sizes))
    }
}

impl fmt::Display for SramOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, size) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{size}K")?;
        }
        Ok(())
    }
}

/// Attributes computed from a single [`PartRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedDescriptor {
    pub variant: String,
    pub cpu_freq_hz: u64,
    pub flash_size_bytes: u64,
    pub sram_options_label: String,
    pub sram_size_bytes: u64,
    pub debug_target_name: String,
    pub flash_series_label: String,
    pub bsp_group: &'static str,
}

impl DerivedDescriptor {
    pub fn derive(part: &PartRecord) -> Result<Self, GenError> {
        let input_err = |reason: String| GenError::InputFormat {
            line: part.line,
            sku: part.sku.clone(),
            reason,
        };

        let sram: SramOptions = part.sram_spec.parse().map_err(
            |e: SramSpecError| input_err(format!("bad SRAM spec: {e}")),
        )?;

        let debug_target_name = debug_target_name(part).map_err(input_err)?;
        let flash_series_label =
            flash_series_label(part).map_err(input_err)?;

        let bsp_group =
            bsp_group(&part.product).ok_or_else(|| GenError::Mapping {
                line: part.line,
                sku: part.sku.clone(),
                product: part.product.clone(),
            })?;

        Ok(Self {
            variant: variant(&part.sku),
            cpu_freq_hz: u64::from(part.speed_mhz) * 1_000_000,
            flash_size_bytes: u64::from(part.flash_kb) * 1024,
            sram_options_label: sram.to_string(),
            sram_size_bytes: u64::from(sram.max_kb()) * 1024,
            debug_target_name,
            flash_series_label,
            bsp_group,
        })
    }

    /// Template-visible name/value pairs.
    pub fn fields(&self) -> IndexMap<&'static str, String> {
        IndexMap::from([
            (VARIANT, self.variant.clone()),
            (CPU_FREQ_HZ, self.cpu_freq_hz.to_string()),
            (FLASH_SIZE_BYTES, self.flash_size_bytes.to_string()),
            (SRAM_OPTIONS_LABEL, self.sram_options_label.clone()),
            (SRAM_SIZE_BYTES, self.sram_size_bytes.to_string()),
            (DEBUG_TARGET_NAME, self.debug_target_name.clone()),
            (FLASH_SERIES_LABEL, self.flash_series_label.clone()),
            (BSP_GROUP, self.bsp_group.to_string()),
        ])
    }
}

/// Replaces separator punctuation so the SKU can be used as one identifier.
pub fn variant(sku: &str) -> String {
    sku.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn debug_target_name(part: &PartRecord) -> Result<String, String> {
    let product = &part.product;
    let suffix = match DEBUG_TARGET_RULES
        .iter()
        .find(|r| r.products.contains(&product.as_str()))
    {
        Some(rule) => {
            let c = part.base_sku().chars().nth(rule.index).ok_or_else(|| {
                format!(
                    "SKU is too short to carry a memory marker at index {}",
                    rule.index
                )
            })?;
            if c == rule.marker {
                rule.on_marker
            } else {
                rule.otherwise
            }
        }
        None => DEFAULT_DEBUG_TARGET_SUFFIX,
    };
    Ok(format!("{}{suffix}", product.to_lowercase()))
}

/// `<product>x<flash marker>`, where the flash marker follows the pin-count
/// marker right after the product code.
fn flash_series_label(part: &PartRecord) -> Result<String, String> {
    let rest = part
        .base_sku()
        .strip_prefix(part.product.as_str())
        .ok_or_else(|| {
            format!("SKU does not start with product code {}", part.product)
        })?;
    let marker = rest
        .chars()
        .nth(1)
        .ok_or_else(|| "SKU has no flash size marker".to_string())?;
    Ok(format!("{}x{marker}", part.product))
}
