// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generates per-chip board descriptors from the parts catalog.
//!
//! Each catalog row is turned into a [`BoardDescriptor`] (the row itself plus
//! the attributes in [`DerivedDescriptor`]), which is then rendered through
//! the board template into `boards/generic<SKU>.json`.
//!
//! Generation is all-or-nothing: every descriptor is derived and rendered in
//! memory before the first file is written, so a bad row, an unknown product,
//! or a template problem leaves the output directory untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::map::Entry;
use indexmap::IndexMap;
use log::{debug, info, warn};

pub mod catalog;
pub mod descriptor;
pub mod template;

pub use catalog::PartRecord;
pub use descriptor::DerivedDescriptor;
pub use template::Template;

pub const OUTPUT_PREFIX: &str = "generic";
pub const OUTPUT_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("catalog line {line} ({sku}): {reason}")]
    InputFormat {
        line: usize,
        sku: String,
        reason: String,
    },
    #[error(
        "catalog line {line} ({sku}): product {product} is not in any BSP group"
    )]
    Mapping {
        line: usize,
        sku: String,
        product: String,
    },
    #[error("invalid placeholder in template at line {line}, column {column}")]
    TemplateSyntax { line: usize, column: usize },
    #[error("template placeholder `{name}` has no value for {sku}")]
    UnresolvedPlaceholder { sku: String, name: String },
}

/// A catalog row together with everything derived from it.
#[derive(Clone, Debug)]
pub struct BoardDescriptor {
    pub part: PartRecord,
    pub derived: DerivedDescriptor,
}

impl BoardDescriptor {
    pub fn new(part: PartRecord) -> Result<Self, GenError> {
        let derived = DerivedDescriptor::derive(&part)?;
        Ok(Self { part, derived })
    }

    /// Catalog columns followed by derived fields. Derived fields win if a
    /// column happens to share a name with one.
    pub fn fields(&self) -> IndexMap<String, String> {
        let mut fields = self.part.fields.clone();
        for (k, v) in self.derived.fields() {
            fields.insert(k.to_string(), v);
        }
        fields
    }

    pub fn render(&self, template: &Template) -> Result<String, GenError> {
        let fields = self.fields();
        template.render(&self.part.sku, |k| fields.get(k).map(|s| s.as_str()))
    }
}

pub fn output_file_name(sku: &str) -> String {
    format!("{OUTPUT_PREFIX}{sku}.{OUTPUT_EXTENSION}")
}

/// Derives a descriptor for every part, keyed by SKU.
///
/// Each part is derived as soon as it is read, so the first bad row stops
/// everything after it from being looked at. A SKU that appears more than
/// once keeps its first position, but the later row replaces the earlier one.
pub fn derive_all<I>(parts: I) -> Result<IndexMap<String, BoardDescriptor>>
where
    I: IntoIterator<Item = Result<PartRecord>>,
{
    let mut boards: IndexMap<String, BoardDescriptor> = IndexMap::new();
    for part in parts {
        let board = BoardDescriptor::new(part?)?;
        debug!(
            "{}: {} / {} RAM / {}",
            board.part.sku,
            board.derived.bsp_group,
            board.derived.sram_options_label,
            board.derived.debug_target_name
        );
        match boards.entry(board.part.sku.clone()) {
            Entry::Occupied(mut e) => {
                warn!(
                    "SKU {} on line {} replaces the one on line {}",
                    board.part.sku,
                    board.part.line,
                    e.get().part.line
                );
                e.insert(board);
            }
            Entry::Vacant(e) => {
                e.insert(board);
            }
        }
    }
    Ok(boards)
}

/// Renders every descriptor, returning output file names and their contents.
pub fn render_all(
    boards: &IndexMap<String, BoardDescriptor>,
    template: &Template,
) -> Result<IndexMap<String, String>, GenError> {
    boards
        .iter()
        .map(|(sku, board)| Ok((output_file_name(sku), board.render(template)?)))
        .collect()
}

/// Locations the generator reads from and writes to.
#[derive(Clone, Debug)]
pub struct Generator {
    pub catalog: PathBuf,
    pub template: PathBuf,
    pub out_dir: PathBuf,
}

impl Generator {
    /// The catalog and template shipped with this crate, writing into the
    /// workspace's `boards` directory.
    pub fn fixed() -> Self {
        let here = Path::new(env!("CARGO_MANIFEST_DIR"));
        Self {
            catalog: here.join("data").join("at32.csv"),
            template: here.join("data").join("board.tpl.json"),
            out_dir: here.join("..").join("..").join("boards"),
        }
    }

    /// Renders every file without touching the output directory.
    pub fn render(&self) -> Result<IndexMap<String, String>> {
        info!("reading template {}", self.template.display());
        let text = fs::read_to_string(&self.template).with_context(|| {
            format!("failed to read {}", self.template.display())
        })?;
        let template = Template::parse(&text)
            .with_context(|| format!("in {}", self.template.display()))?;
        debug!("template fields: {}", template.placeholders().join(", "));

        info!("reading catalog {}", self.catalog.display());
        let file = fs::File::open(&self.catalog).with_context(|| {
            format!("failed to open {}", self.catalog.display())
        })?;
        let boards = derive_all(catalog::records(file)?)?;
        Ok(render_all(&boards, &template)?)
    }

    /// Renders and writes every descriptor, replacing any existing file of
    /// the same name. Returns the paths written, in catalog order.
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        let rendered = self.render()?;

        fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("failed to create {}", self.out_dir.display())
        })?;

        let mut written = Vec::with_capacity(rendered.len());
        for (name, text) in rendered {
            let path = self.out_dir.join(name);
            fs::write(&path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            debug!("wrote {}", path.display());
            written.push(path);
        }
        info!(
            "generated {} board descriptors in {}",
            written.len(),
            self.out_dir.display()
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use regex::Regex;

    const CATALOG: &str = indoc! {"
        Product,SKU,Package,Speed,Flash,SRAM
        AT32F437,AT32F437ZMT7,LQFP144,288,4096,224/384+32
        AT32F421,AT32F421C8T7,LQFP48,120,64,16
        AT32F403A,AT32F403AVGT7,LQFP100,240,1024,96/224
    "};

    const TEMPLATE: &str = indoc! {r#"
        {
          "bsp": "${bsp_group}",
          "f_cpu": "${cpu_freq_hz}L",
          "line": "${flash_series_label}",
          "name": "${SKU} in ${Package} (${sram_options_label} RAM)",
          "ram": $sram_size_bytes,
          "rom": $flash_size_bytes,
          "target": "$debug_target_name",
          "variant": "${variant}"
        }
    "#};

    struct Fixture {
        dir: tempfile::TempDir,
        generator: Generator,
    }

    fn fixture(catalog: &str, template: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("parts.csv");
        let template_path = dir.path().join("board.tpl.json");
        fs::write(&catalog_path, catalog).unwrap();
        fs::write(&template_path, template).unwrap();
        let generator = Generator {
            catalog: catalog_path,
            template: template_path,
            out_dir: dir.path().join("boards"),
        };
        Fixture { dir, generator }
    }

    fn gen_error(e: anyhow::Error) -> GenError {
        e.downcast::<GenError>().unwrap()
    }

    #[test]
    fn writes_one_file_per_sku() {
        let f = fixture(CATALOG, TEMPLATE);
        let written = f.generator.run().unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(
            names,
            [
                "genericAT32F437ZMT7.json",
                "genericAT32F421C8T7.json",
                "genericAT32F403AVGT7.json"
            ]
        );

        let text = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(
            text,
            indoc! {r#"
                {
                  "bsp": "AT32F435_437",
                  "f_cpu": "288000000L",
                  "line": "AT32F437xM",
                  "name": "AT32F437ZMT7 in LQFP144 (224K/384K/416K RAM)",
                  "ram": 425984,
                  "rom": 4194304,
                  "target": "at32f437xM",
                  "variant": "AT32F437ZMT7"
                }
            "#}
        );
    }

    #[test]
    fn outputs_are_complete() {
        let f = fixture(CATALOG, TEMPLATE);
        let leftover = Regex::new(r"\$[{_A-Za-z]").unwrap();
        for path in f.generator.run().unwrap() {
            let text = fs::read_to_string(&path).unwrap();
            assert!(!text.is_empty());
            assert!(!leftover.is_match(&text), "{}", path.display());
        }
    }

    #[test]
    fn second_run_is_byte_identical() {
        let f = fixture(CATALOG, TEMPLATE);
        let read_all = |paths: &[PathBuf]| -> Vec<Vec<u8>> {
            paths.iter().map(|p| fs::read(p).unwrap()).collect()
        };
        let first = read_all(&f.generator.run().unwrap());
        let second = read_all(&f.generator.run().unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn existing_files_are_overwritten() {
        let f = fixture(CATALOG, TEMPLATE);
        fs::create_dir_all(&f.generator.out_dir).unwrap();
        let stale = f.generator.out_dir.join("genericAT32F421C8T7.json");
        fs::write(&stale, "stale").unwrap();
        f.generator.run().unwrap();
        assert!(fs::read_to_string(&stale).unwrap().contains("at32f421xx"));
    }

    #[test]
    fn unmapped_product_writes_nothing() {
        let catalog = indoc! {"
            Product,SKU,Package,Speed,Flash,SRAM
            AT32F421,AT32F421C8T7,LQFP48,120,64,16
            AT32F999,AT32F999CCT7,LQFP48,100,64,16
            AT32F425,AT32F425R8T7,LQFP64,96,64,20
        "};
        let f = fixture(catalog, TEMPLATE);
        let err = gen_error(f.generator.run().unwrap_err());
        assert!(
            matches!(&err, GenError::Mapping { line: 3, sku, .. } if sku == "AT32F999CCT7"),
            "{err}"
        );
        assert!(!f.generator.out_dir.exists());
    }

    #[test]
    fn unmapped_product_stops_before_later_rows() {
        let catalog = indoc! {"
            Product,SKU,Package,Speed,Flash,SRAM
            AT32F999,AT32F999CCT7,LQFP48,100,64,16
            AT32F421,AT32F421C8T7,LQFP48,fast,64,16
        "};
        let f = fixture(catalog, TEMPLATE);
        let err = gen_error(f.generator.run().unwrap_err());
        assert!(matches!(err, GenError::Mapping { line: 2, .. }), "{err}");
        assert!(!f.generator.out_dir.exists());
    }

    #[test]
    fn template_error_names_the_file() {
        let f = fixture(CATALOG, "{\"price\": \"$5\"}\n");
        let err = f.generator.run().unwrap_err();
        assert!(
            format!("{err:#}").contains("board.tpl.json"),
            "{err:#}"
        );
        assert!(matches!(
            gen_error(err),
            GenError::TemplateSyntax { line: 1, column: 12 }
        ));
        assert!(!f.generator.out_dir.exists());
    }

    #[test]
    fn malformed_row_writes_nothing() {
        let catalog = indoc! {"
            Product,SKU,Package,Speed,Flash,SRAM
            AT32F421,AT32F421C8T7,LQFP48,120,64,16
            AT32F425,AT32F425R8T7,LQFP64,96,64K,20
        "};
        let f = fixture(catalog, TEMPLATE);
        let err = gen_error(f.generator.run().unwrap_err());
        assert!(matches!(err, GenError::InputFormat { line: 3, .. }), "{err}");
        assert!(!f.generator.out_dir.exists());
    }

    #[test]
    fn unknown_placeholder_writes_nothing() {
        let f = fixture(CATALOG, "{\"core\": \"${core}\"}\n");
        let err = gen_error(f.generator.run().unwrap_err());
        match err {
            GenError::UnresolvedPlaceholder { sku, name } => {
                assert_eq!(sku, "AT32F437ZMT7");
                assert_eq!(name, "core");
            }
            e => panic!("unexpected error {e}"),
        }
        assert!(!f.generator.out_dir.exists());
    }

    #[test]
    fn duplicate_sku_last_row_wins_in_first_position() {
        let catalog = indoc! {"
            Product,SKU,Package,Speed,Flash,SRAM
            AT32F421,AT32F421C8T7,LQFP48,120,64,16
            AT32F425,AT32F425R8T7,LQFP64,96,64,20
            AT32F421,AT32F421C8T7,QFN32,120,64,16
        "};
        let parts = catalog::records(catalog.as_bytes()).unwrap();
        let boards = derive_all(parts).unwrap();
        assert_eq!(
            boards.keys().collect::<Vec<_>>(),
            ["AT32F421C8T7", "AT32F425R8T7"]
        );
        let first = &boards["AT32F421C8T7"];
        assert_eq!(first.part.line, 4);
        assert_eq!(first.part.fields["Package"], "QFN32");
    }

    #[test]
    fn packaging_suffix_is_kept_in_file_name() {
        let catalog = indoc! {"
            Product,SKU,Package,Speed,Flash,SRAM
            AT32WB415,AT32WB415CCU7-7,QFN48,150,256,32
        "};
        let f = fixture(catalog, TEMPLATE);
        let written = f.generator.run().unwrap();
        assert_eq!(
            written,
            [f.dir.path().join("boards").join("genericAT32WB415CCU7-7.json")]
        );
        let text = fs::read_to_string(&written[0]).unwrap();
        assert!(text.contains("\"variant\": \"AT32WB415CCU7_7\""));
        assert!(text.contains("\"line\": \"AT32WB415xC\""));
    }

    #[test]
    fn derived_field_shadows_column() {
        let catalog = indoc! {"
            Product,SKU,Speed,Flash,SRAM,variant
            AT32F421,AT32F421C8T7,120,64,16,ignored
        "};
        let parts = catalog::records(catalog.as_bytes()).unwrap();
        let boards = derive_all(parts).unwrap();
        let t = Template::parse("$variant").unwrap();
        let (_, board) = boards.get_index(0).unwrap();
        assert_eq!(board.render(&t).unwrap(), "AT32F421C8T7");
    }

    #[test]
    fn shipped_catalog_renders() {
        let rendered = Generator::fixed().render().unwrap();
        assert!(rendered.contains_key("genericAT32F437ZMT7.json"));
        for (name, text) in &rendered {
            assert!(!text.contains('$'), "{name}");
        }
    }
}
