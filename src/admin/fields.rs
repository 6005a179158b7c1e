//! Mapping between submitted form fields and the live header row.

use std::collections::HashMap;

/// One add-form field.
pub struct Field {
    /// Canonical form name.
    pub name: &'static str,
    /// Short names accepted in place of `name`.
    pub aliases: &'static [&'static str],
    /// Headers the value is written into. The first doubles as the label.
    pub headers: &'static [&'static str],
}

impl Field {
    fn accepts(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }
}

/// Canonical add-form fields and the headers each one fills.
///
/// Header names are matched exactly. A field listed against several headers
/// writes the same value into each of them (legacy sheets carry duplicate
/// date/theme columns).
pub const FIELDS: &[Field] = &[
    Field { name: "title", aliases: &[], headers: &["Title"] },
    Field { name: "url", aliases: &[], headers: &["URL"] },
    Field { name: "target_audience", aliases: &["audience"], headers: &["Target Audience"] },
    Field { name: "authors", aliases: &[], headers: &["Author(s)"] },
    Field { name: "publisher", aliases: &[], headers: &["Publisher"] },
    Field { name: "date_published", aliases: &[], headers: &["Date Pub", "Date Published"] },
    Field {
        name: "resource_theme",
        aliases: &["theme"],
        headers: &["Resource Theme", "Date Pub Resource Theme"],
    },
    Field { name: "resource_type", aliases: &["type"], headers: &["Resource Type"] },
    Field { name: "keywords", aliases: &[], headers: &["Keywords"] },
    Field { name: "language", aliases: &[], headers: &["Language"] },
    Field { name: "status", aliases: &[], headers: &["Status"] },
    Field { name: "notes", aliases: &[], headers: &["Notes"] },
];

/// Add-resource submission keyed by canonical field name. Every field is
/// optional.
#[derive(Debug, Default, Clone)]
pub struct ResourceForm {
    values: HashMap<&'static str, String>,
}

impl ResourceForm {
    /// Collect submitted pairs. A short name counts as its canonical field,
    /// the first value seen for a field wins and unknown keys are ignored.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut values = HashMap::new();
        for (key, value) in pairs {
            if let Some(field) = FIELDS.iter().find(|f| f.accepts(key)) {
                values
                    .entry(field.name)
                    .or_insert_with(|| value.trim().to_string());
            }
        }
        Self { values }
    }

    /// Trimmed value of a canonical field.
    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map_or("", String::as_str)
    }

    pub fn has_title_and_url(&self) -> bool {
        !self.value("title").is_empty() && !self.value("url").is_empty()
    }

    /// One value per header, in header order. Headers that no field maps to
    /// get an empty string.
    pub fn row_for(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| {
                field_for_header(h)
                    .map(|f| self.value(f.name).to_string())
                    .unwrap_or_default()
            })
            .collect()
    }
}

fn field_for_header(header: &str) -> Option<&'static Field> {
    FIELDS.iter().find(|f| f.headers.contains(&header))
}

/// Parsed row-edit submission.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RowEdit {
    pub sheet_row: Option<u32>,
    /// Edited cells in submission order.
    pub fields: Vec<(String, String)>,
}

impl RowEdit {
    /// Parse `sheet_row` plus the indexed `header_{i}` / `field_{i}` pairs.
    /// Collection stops at the first missing `header_{i}`; a missing
    /// `field_{i}` reads as empty.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut index: HashMap<&str, &str> = HashMap::with_capacity(pairs.len());
        for (k, v) in pairs {
            index.entry(k.as_str()).or_insert(v.as_str());
        }

        let sheet_row = index.get("sheet_row").copied().and_then(parse_row);

        let mut fields = Vec::new();
        for i in 0.. {
            let Some(&header) = index.get(format!("header_{i}").as_str()) else {
                break;
            };
            let value = index
                .get(format!("field_{i}").as_str())
                .copied()
                .unwrap_or("");
            fields.push((header.to_string(), value.to_string()));
        }

        RowEdit { sheet_row, fields }
    }

    /// Replacement row in header order. Headers absent from the edit are
    /// cleared; edits naming unknown headers are dropped.
    pub fn row_for(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| {
                self.fields
                    .iter()
                    .rev()
                    .find(|(eh, _)| eh == h)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Parse a submitted sheet row number.
pub fn parse_row(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}
