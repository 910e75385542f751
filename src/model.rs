use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};

/// One scalar cell value as read from the worksheet.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    /// A number cell whose style is a date or date-time format.
    DateTime(NaiveDateTime),
    /// A time-only cell (serial below one day under a date/time format).
    Time(NaiveTime),
    Empty,
}

impl Value {
    /// Displayed text, untrimmed. Integral numbers print without a fraction;
    /// dates print as `YYYY-MM-DD`, with `HH:MM:SS` only when the time is not midnight.
    pub fn display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::DateTime(dt) if dt.time() == NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::Empty => String::new(),
        }
    }

    /// Trimmed display text, or `None` when nothing would be shown.
    pub fn non_empty(&self) -> Option<String> {
        let text = self.display();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// One worksheet row. Field order is the column order; names may repeat.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// First field with exactly this name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// Fields of one record sharing a suffix-stripped base name.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldGroup {
    pub base_name: String,
    /// (original field name, trimmed value) for every non-empty member, in record order.
    pub members: Vec<(String, String)>,
}

impl FieldGroup {
    /// All non-empty members carry the same trimmed text.
    pub fn is_collapsed(&self) -> bool {
        self.members
            .first()
            .is_some_and(|(_, first)| self.members.iter().all(|(_, v)| v == first))
    }

    /// (label, value) pairs to display: one under the base name when collapsed,
    /// otherwise one per member under its original name.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        if self.is_collapsed() {
            let value = self.members[0].1.as_str();
            vec![(self.base_name.as_str(), value)]
        } else {
            self.members
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Span {
    Text(String),
    Link { url: String, label: String },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alignment {
    Left,
    Center,
    Justify,
}

/// A labeled text block: `label: value`, or just the value for reference lines.
/// A header-only block has a label and no spans.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldBlock {
    pub label: Option<String>,
    pub spans: Vec<Span>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Title(String),
    Field(FieldBlock),
    /// Bordered block of fields rendered together.
    Group(Vec<FieldBlock>),
}
