use std::fmt;
use std::str::FromStr;

use crate::csv::Row;

/// Per-column substring constraints. An empty value leaves the column unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterMap {
    entries: Vec<(String, String)>,
}

impl FilterMap {
    /// All-empty filters, one per distinct header name, in header order.
    pub fn from_headers(headers: &[String]) -> Self {
        let mut map = Self::default();
        for h in headers {
            if map.get(h).is_none() {
                map.entries.push((h.clone(), String::new()));
            }
        }
        map
    }

    /// Rebuild for a new header list, keeping values of columns that still exist.
    pub fn reseed(&self, headers: &[String]) -> Self {
        let mut map = Self::from_headers(headers);
        for (col, val) in map.entries.iter_mut() {
            if let Some(prev) = self.get(col) {
                *val = prev.to_string();
            }
        }
        map
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut String> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v)
    }

    /// Clear every value, keeping the columns.
    pub fn reset(&mut self) {
        for (_, v) in self.entries.iter_mut() {
            v.clear();
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.trim().is_empty())
    }

    /// Non-empty constraints, trimmed.
    pub fn active(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FilterMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FilterMap::default();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

/// Rows matching every non-empty filter (case-insensitive substring, AND across columns).
///
/// Always scans the full input; returns it unchanged when no filter is active.
pub fn filter_rows(rows: &[Row], filters: &FilterMap) -> Vec<Row> {
    if filters.is_unconstrained() {
        return rows.to_vec();
    }
    let needles: Vec<(&str, String)> = filters
        .active()
        .map(|(col, v)| (col, v.to_lowercase()))
        .collect();

    rows.iter()
        .filter(|row| {
            needles.iter().all(|(col, needle)| {
                row.get(col)
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(needle.as_str())
            })
        })
        .cloned()
        .collect()
}

/// The first `count` rows, for display.
pub fn limit_rows(rows: &[Row], count: usize) -> &[Row] {
    &rows[..count.min(rows.len())]
}

/// A column addressed either by zero-based position or by header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    /// Resolve against the header list; `None` when the column does not exist.
    pub fn resolve<'a>(&'a self, headers: &'a [String]) -> Option<&'a str> {
        match self {
            ColumnRef::Index(i) => headers.get(*i).map(|s| s.as_str()),
            ColumnRef::Name(name) => headers
                .iter()
                .any(|h| h == name)
                .then_some(name.as_str()),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{i}"),
            ColumnRef::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for ColumnRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(idx) = s.strip_prefix('#') {
            return idx
                .parse::<usize>()
                .map(ColumnRef::Index)
                .map_err(|_| format!("invalid column index: {s}"));
        }
        if s.is_empty() {
            return Err("empty column name".into());
        }
        Ok(ColumnRef::Name(s.to_string()))
    }
}

/// A `COLUMN=VALUE` filter given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterArg {
    pub column: ColumnRef,
    pub value: String,
}

impl FromStr for FilterArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (col, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected COLUMN=VALUE, got '{s}'"))?;
        Ok(FilterArg {
            column: col.parse()?,
            value: value.to_string(),
        })
    }
}

/// Apply command-line filters to a freshly seeded map. Returns the args that
/// matched no column.
pub fn apply_filter_args<'a>(
    filters: &mut FilterMap,
    headers: &[String],
    args: &'a [FilterArg],
) -> Vec<&'a FilterArg> {
    let mut unmatched = Vec::new();
    for arg in args {
        match arg.column.resolve(headers) {
            Some(col) => filters.set(col, arg.value.clone()),
            None => unmatched.push(arg),
        }
    }
    unmatched
}
