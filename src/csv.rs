/// One parsed record, keyed by column name in header order.
///
/// Keys are unique: when the header line repeats a name, the later column's
/// value overwrites the earlier one and the key keeps its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the value for `column`.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// Result of parsing one text payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Parse comma-delimited text into headers and rows.
///
/// Never fails: blank lines are skipped, short rows are padded with empty
/// strings, surplus fields are dropped and unbalanced quotes run to the end
/// of the line.
pub fn parse_delimited_text(text: &str) -> ParsedTable {
    if text.is_empty() {
        return ParsedTable::default();
    }

    let mut lines = text.split('\n');
    let headers: Vec<String> = match lines.next() {
        Some(line) => line.split(',').map(|h| h.trim().to_string()).collect(),
        None => return ParsedTable::default(),
    };

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut values = split_fields(line).into_iter();
        let row = headers
            .iter()
            .map(|h| (h.clone(), values.next().unwrap_or_default()))
            .collect::<Row>();
        rows.push(row);
    }

    ParsedTable { headers, rows }
}

/// Split one line into trimmed fields, honoring double-quote escaping.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    buf.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                out.push(buf.trim().to_string());
                buf.clear();
            }
            _ => buf.push(ch),
        }
    }
    out.push(buf.trim().to_string());
    out
}

/// Quote a value for CSV output when it contains a delimiter, quote or newline.
pub fn escape_field(value: &str) -> std::borrow::Cow<'_, str> {
    let needs_quotes = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().copied().collect()
    }

    #[test]
    fn extracts_headers_and_rows() {
        let t = parse_delimited_text("a,b,c\n1,2,3");
        assert_eq!(t.headers, vec!["a", "b", "c"]);
        assert_eq!(t.rows, vec![row(&[("a", "1"), ("b", "2"), ("c", "3")])]);
    }

    #[test]
    fn quoted_field_keeps_embedded_comma() {
        let t = parse_delimited_text("a,b\n\"x,y\",z");
        assert_eq!(t.rows, vec![row(&[("a", "x,y"), ("b", "z")])]);
    }

    #[test]
    fn doubled_quote_is_literal() {
        let t = parse_delimited_text("a\n\"he said \"\"hi\"\"\"");
        assert_eq!(t.rows, vec![row(&[("a", "he said \"hi\"")])]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let t = parse_delimited_text("a,b\n1,2\n\n3,4\n   \n");
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1].get("a"), Some("3"));
    }

    #[test]
    fn short_rows_are_padded() {
        let t = parse_delimited_text("a,b,c\n1,2");
        assert_eq!(t.rows, vec![row(&[("a", "1"), ("b", "2"), ("c", "")])]);
    }

    #[test]
    fn surplus_fields_are_dropped() {
        let t = parse_delimited_text("a,b\n1,2,3,4");
        assert_eq!(t.rows, vec![row(&[("a", "1"), ("b", "2")])]);
    }

    #[test]
    fn empty_input_is_empty_table() {
        let t = parse_delimited_text("");
        assert!(t.headers.is_empty());
        assert!(t.rows.is_empty());
    }

    #[test]
    fn header_only_input_has_no_rows() {
        let t = parse_delimited_text("a, b ,c\n");
        assert_eq!(t.headers, vec!["a", "b", "c"]);
        assert!(t.rows.is_empty());
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        let t = parse_delimited_text("a,b\r\n1,2\r\n");
        assert_eq!(t.headers, vec!["a", "b"]);
        assert_eq!(t.rows, vec![row(&[("a", "1"), ("b", "2")])]);
    }

    #[test]
    fn duplicate_headers_last_write_wins() {
        let t = parse_delimited_text("a,a,b\n1,2,3");
        assert_eq!(t.headers, vec!["a", "a", "b"]);
        let r = &t.rows[0];
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("a"), Some("2"));
        assert_eq!(r.iter().next(), Some(("a", "2")));
    }

    #[test]
    fn unbalanced_quote_runs_to_end_of_line() {
        assert_eq!(split_fields("\"x,y"), vec!["x,y"]);
        let t = parse_delimited_text("a,b\n\"open,still open\n1,2");
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].get("a"), Some("open,still open"));
        assert_eq!(t.rows[0].get("b"), Some(""));
    }

    #[test]
    fn split_fields_empty_line_yields_one_field() {
        assert_eq!(split_fields(""), vec![""]);
        assert_eq!(split_fields(" , "), vec!["", ""]);
    }

    #[test]
    fn escape_field_quotes_when_needed() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn escaped_output_parses_back() {
        let value = "x, \"y\"";
        let text = format!("col\n{}", escape_field(value));
        let t = parse_delimited_text(&text);
        assert_eq!(t.rows[0].get("col"), Some(value));
    }
}
