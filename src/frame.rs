//! In-memory table shared by every pipeline stage.
//!
//! A [`Frame`] is a header list plus row-major cells. Stages mutate it in
//! place; the only operations that change the row count are
//! [`Frame::retain_rows`] and [`Frame::concat`], and neither can add rows
//! that were not read from the source.

use crate::data::{Cell, Value};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Builds a frame from already-typed rows. Each row is padded or cut to
    /// the header width.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Convenience for tests and fixtures: every non-empty string becomes text.
    pub fn from_text_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|raw| crate::data::parse_raw_cell(raw)).collect())
            .collect();
        Self::from_rows(headers, rows)
    }

    /// Concatenates chunks that share the same headers, keeping row order.
    pub fn concat(headers: Vec<String>, chunks: Vec<Vec<Vec<Cell>>>) -> Self {
        let total = chunks.iter().map(Vec::len).sum();
        let mut rows = Vec::with_capacity(total);
        for chunk in chunks {
            rows.extend(chunk);
        }
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    /// Cells of one column in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Numeric view of a column; cells that are missing or not numeric are `None`.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[idx].as_ref().and_then(Value::as_number))
                .collect(),
        )
    }

    pub fn rename_headers<F>(&mut self, mut rename: F)
    where
        F: FnMut(&str) -> String,
    {
        for header in &mut self.headers {
            *header = rename(header);
        }
    }

    /// Applies `update` to every cell of `name`. Returns false if the column is absent.
    pub fn update_column<F>(&mut self, name: &str, mut update: F) -> bool
    where
        F: FnMut(&mut Cell),
    {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            update(&mut row[idx]);
        }
        true
    }

    /// Sets a column, replacing it when it already exists.
    ///
    /// `values` must hold exactly one cell per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Removes the named columns if present and returns the names actually removed.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let mut keep = vec![true; self.headers.len()];
        let mut removed = Vec::new();
        for name in names {
            if let Some(idx) = self.column_index(name)
                && keep[idx]
            {
                keep[idx] = false;
                removed.push(name.clone());
            }
        }
        if removed.is_empty() {
            return removed;
        }
        self.headers = retain_by_mask(std::mem::take(&mut self.headers), &keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &keep);
        }
        removed
    }

    /// Keeps rows whose mask entry is true and returns how many were dropped.
    pub fn retain_rows(&mut self, mask: &[bool]) -> usize {
        debug_assert_eq!(mask.len(), self.rows.len());
        let before = self.rows.len();
        let rows = std::mem::take(&mut self.rows);
        self.rows = rows
            .into_iter()
            .zip(mask.iter())
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect();
        before - self.rows.len()
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep.iter())
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_text_rows(
            &["a", "b", "c"],
            &[&["1", "x", ""], &["2", "y", "z"], &["3"]],
        )
    }

    #[test]
    fn short_rows_are_padded_with_missing_cells() {
        let frame = sample();
        assert_eq!(frame.rows()[2], vec![Some(Value::Text("3".into())), None, None]);
    }

    #[test]
    fn drop_columns_tolerates_absent_names() {
        let mut frame = sample();
        let removed = frame.drop_columns(&["c".into(), "zzz".into(), "a".into()]);
        assert_eq!(removed, vec!["c".to_string(), "a".to_string()]);
        assert_eq!(frame.headers(), &["b".to_string()]);
        assert_eq!(frame.rows()[1], vec![Some(Value::Text("y".into()))]);
    }

    #[test]
    fn retain_rows_reports_dropped_count() {
        let mut frame = sample();
        let dropped = frame.retain_rows(&[true, false, true]);
        assert_eq!(dropped, 1);
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.cell(1, "a"), Some(&Value::Text("3".into())));
    }

    #[test]
    fn set_column_replaces_existing_values() {
        let mut frame = sample();
        frame.set_column("b", vec![None, None, Some(Value::Number(1.0))]);
        assert_eq!(frame.column_count(), 3);
        assert_eq!(frame.cell(2, "b"), Some(&Value::Number(1.0)));
        frame.set_column("d", vec![None, None, None]);
        assert_eq!(frame.headers().last().map(String::as_str), Some("d"));
    }
}
