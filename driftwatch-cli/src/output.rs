//! Plain-text table rendering for terminal output.

use unicode_width::UnicodeWidthStr;

/// A column-aligned text table.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub(crate) fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Missing cells render empty, extra cells are dropped.
    pub(crate) fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn render(&self) -> String {
        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .map(|row| row[i].width())
                    .chain(std::iter::once(header.width()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        push_line(&mut out, &self.headers, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &rule, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.width());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Format a metric for display; NaN prints as `NaN`.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{value:.4}")
    }
}

pub(crate) fn format_alert(alert: bool) -> String {
    if alert { "ALERT".to_string() } else { String::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_columns_are_aligned() {
        let mut table = Table::new(["key", "error"]);
        table.push_row(vec!["[0:99]".into(), "0.5".into()]);
        table.push_row(vec!["[100:199]".into(), "1.25".into()]);
        assert_eq!(
            table.render(),
            "key        error\n---------  -----\n[0:99]     0.5\n[100:199]  1.25\n"
        );
    }

    #[test]
    fn test_wide_glyphs_are_aligned_by_display_width() {
        let mut table = Table::new(["region", "n"]);
        table.push_row(vec!["東京".into(), "1".into()]);
        table.push_row(vec!["paris".into(), "2".into()]);
        assert_eq!(
            table.render(),
            "region  n\n------  -\n東京    1\nparis   2\n"
        );
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut table = Table::new(["a", "b", "c"]);
        table.push_row(vec!["1".into()]);
        assert_eq!(table.len(), 1);
        assert!(table.render().ends_with("1\n"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(0.123456), "0.1235");
        assert_eq!(format_alert(true), "ALERT");
        assert_eq!(format_alert(false), "");
    }
}
