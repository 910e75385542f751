use std::sync::LazyLock;

use regex::Regex;

use crate::model::{FieldGroup, Record};

static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.\d+$").unwrap());

/// Field name with the trailing `.N` disambiguation suffix removed (`Researcher.1` → `Researcher`).
pub(crate) fn base_name(field: &str) -> &str {
    let trimmed = field.trim();
    match SUFFIX_RE.find(trimmed) {
        Some(m) => trimmed[..m.start()].trim_end(),
        None => trimmed,
    }
}

/// Group a record's fields by base name, in order of first appearance.
/// Empty values are left out; groups left with no values are dropped.
pub fn normalize(record: &Record) -> Vec<FieldGroup> {
    let mut groups: Vec<FieldGroup> = Vec::new();

    for (name, value) in record.fields() {
        let base = base_name(name);
        let idx = match groups.iter().position(|g| g.base_name == base) {
            Some(i) => i,
            None => {
                groups.push(FieldGroup {
                    base_name: base.to_string(),
                    members: Vec::new(),
                });
                groups.len() - 1
            }
        };
        if let Some(text) = value.non_empty() {
            groups[idx].members.push((name.trim().to_string(), text));
        }
    }

    groups.retain(|g| !g.members.is_empty());
    groups
}
