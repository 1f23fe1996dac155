use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{data::parse_number, frame::Frame};

const MAX_CELL_WIDTH: usize = 32;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    let mut numeric = vec![true; column_count];

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(&clip(&sanitize_cell(cell))));
            if !cell.is_empty() && parse_number(cell).is_none() {
                numeric[idx] = false;
            }
        }
    }
    let widths = widths
        .into_iter()
        .map(|w| w.clamp(1, MAX_CELL_WIDTH))
        .collect::<Vec<_>>();

    let mut output = String::new();
    let left = vec![false; column_count];
    let _ = writeln!(output, "{}", format_row(headers, &widths, &left));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &left));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Renders the first `limit` rows of a frame; missing cells show as blanks.
pub fn render_frame(frame: &Frame, limit: usize) -> String {
    let rows = frame
        .rows()
        .iter()
        .take(limit)
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    render_table(frame.headers(), &rows)
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .zip(right_align)
        .map(|((value, width), right)| {
            let cell = clip(&sanitize_cell(value)).into_owned();
            let padding = " ".repeat(width.saturating_sub(display_width(&cell)));
            if *right {
                format!("{padding}{cell}")
            } else {
                format!("{cell}{padding}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn clip(value: &str) -> Cow<'_, str> {
    if display_width(value) <= MAX_CELL_WIDTH {
        return Cow::Borrowed(value);
    }
    let mut clipped = value.chars().take(MAX_CELL_WIDTH - 1).collect::<String>();
    clipped.push('…');
    Cow::Owned(clipped)
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
