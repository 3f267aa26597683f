use std::fmt;

use crate::error::{HarnessError, Result};
use crate::metrics::{AggregateMetrics, ClassMetrics};

pub const HEADER: [&str; 6] = ["Class", "OA", "Precision", "Recall", "F1_Score", "IOU"];

const OA_PLACEHOLDER: &str = "--";
const TOTAL_LABEL: &str = "total";

/// One table row: a class index (or `total`), an optional OA cell, and the
/// four metric cells (precision, recall, F1, IoU; or their class means).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub oa: Option<f64>,
    pub values: [f64; 4],
}

/// Per-class metrics table with a trailing `total` row, values rounded to
/// four decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new(metrics: &ClassMetrics, aggregate: &AggregateMetrics) -> Self {
        let mut rows: Vec<ReportRow> = (0..metrics.num_classes())
            .map(|k| ReportRow {
                label: k.to_string(),
                oa: None,
                values: [
                    round4(metrics.precision[k]),
                    round4(metrics.recall[k]),
                    round4(metrics.f1[k]),
                    round4(metrics.iou[k]),
                ],
            })
            .collect();

        rows.push(ReportRow {
            label: TOTAL_LABEL.to_string(),
            oa: Some(round4(aggregate.oa)),
            values: [
                round4(aggregate.prec),
                round4(aggregate.recall),
                round4(aggregate.f1),
                round4(aggregate.miou),
            ],
        });
        ReportTable { rows }
    }

    pub fn total(&self) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.label == TOTAL_LABEL)
    }

    /// Reads back a table produced by `Display`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| l.starts_with('|'));

        let header = lines.next().ok_or_else(|| HarnessError::ReportParse("no header row".into()))?;
        if split_cells(header) != HEADER {
            return Err(HarnessError::ReportParse(format!("unexpected header `{}`", header)));
        }

        let rows = lines
            .map(|line| {
                let cells = split_cells(line);
                if cells.len() != HEADER.len() {
                    return Err(HarnessError::ReportParse(format!("row has {} cells: `{}`", cells.len(), line)));
                }
                let oa = match cells[1] {
                    OA_PLACEHOLDER => None,
                    cell => Some(parse_number(cell)?),
                };
                let mut values = [0.0; 4];
                for (slot, cell) in values.iter_mut().zip(&cells[2..]) {
                    *slot = parse_number(cell)?;
                }
                Ok(ReportRow { label: cells[0].to_string(), oa, values })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ReportTable { rows })
    }

    fn cells(&self) -> Vec<[String; 6]> {
        self.rows
            .iter()
            .map(|r| {
                [
                    r.label.clone(),
                    r.oa.map(|v| format!("{:.4}", v)).unwrap_or_else(|| OA_PLACEHOLDER.to_string()),
                    format!("{:.4}", r.values[0]),
                    format!("{:.4}", r.values[1]),
                    format!("{:.4}", r.values[2]),
                    format!("{:.4}", r.values[3]),
                ]
            })
            .collect()
    }
}

impl fmt::Display for ReportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.cells();
        let mut widths: Vec<usize> = HEADER.iter().map(|h| h.len()).collect();
        for row in &body {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }

        let rule: String = widths.iter().fold(String::from("+"), |mut acc, w| {
            acc.push_str(&"-".repeat(w + 2));
            acc.push('+');
            acc
        });

        writeln!(f, "{}", rule)?;
        writeln!(f, "{}", render_line(&HEADER, &widths))?;
        writeln!(f, "{}", rule)?;
        for row in &body {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            writeln!(f, "{}", render_line(&cells, &widths))?;
        }
        write!(f, "{}", rule)
    }
}

fn render_line(cells: &[&str], widths: &[usize]) -> String {
    cells.iter().zip(widths).fold(String::from("|"), |mut acc, (cell, &w)| {
        acc.push_str(&format!(" {:^w$} |", cell, w = w));
        acc
    })
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn split_cells(line: &str) -> Vec<&str> {
    line.trim_matches('|').split('|').map(str::trim).collect()
}

fn parse_number(cell: &str) -> Result<f64> {
    cell.parse::<f64>()
        .map_err(|_| HarnessError::ReportParse(format!("`{}` is not a number", cell)))
}
