// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `$`-placeholder templates.
//!
//! A placeholder is written `$name` or `${name}`, where `name` is an
//! identifier (`[_A-Za-z][_A-Za-z0-9]*`). `$$` produces a literal `$`. Any
//! other `$` is a syntax error, as is a placeholder with no value at render
//! time; there is no blank substitution.

use regex::Regex;

use crate::GenError;

const PLACEHOLDER: &str = r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Piece {
    Text(String),
    Field(String),
}

#[derive(Clone, Debug)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, GenError> {
        let re = Regex::new(PLACEHOLDER).expect("placeholder regex is valid");

        let mut pieces = vec![];
        let mut literal = String::new();
        let mut last = 0;
        for caps in re.captures_iter(text) {
            let m = caps.get(0).expect("group 0 always matches");
            literal.push_str(&text[last..m.start()]);
            last = m.end();

            if caps.name("escaped").is_some() {
                literal.push('$');
            } else if let Some(name) =
                caps.name("named").or_else(|| caps.name("braced"))
            {
                if !literal.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut literal)));
                }
                pieces.push(Piece::Field(name.as_str().to_string()));
            } else {
                let before = &text[..m.start()];
                let line = before.matches('\n').count() + 1;
                let column = before.len()
                    - before.rfind('\n').map(|i| i + 1).unwrap_or(0)
                    + 1;
                return Err(GenError::TemplateSyntax { line, column });
            }
        }
        literal.push_str(&text[last..]);
        if !literal.is_empty() {
            pieces.push(Piece::Text(literal));
        }

        Ok(Self { pieces })
    }

    /// Placeholder names in order of first use.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = vec![];
        for p in &self.pieces {
            if let Piece::Field(name) = p {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitutes every placeholder using `lookup`. `sku` only labels the
    /// error when a placeholder has no value.
    pub fn render<'a, F>(&self, sku: &str, lookup: F) -> Result<String, GenError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut out = String::new();
        for p in &self.pieces {
            match p {
                Piece::Text(t) => out.push_str(t),
                Piece::Field(name) => {
                    let value = lookup(name).ok_or_else(|| {
                        GenError::UnresolvedPlaceholder {
                            sku: sku.to_string(),
                            name: name.clone(),
                        }
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
