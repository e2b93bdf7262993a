//! `export` output writers (§6.1). CSV via the `csv` crate, Excel via
//! `rust_xlsxwriter` — both already on the teacher's ingestion/reporting path
//! for message exports, generalized here to gems/profiles.

use crate::domain::Gem;
use crate::error::{AppError, AppResult};
use rust_xlsxwriter::Workbook;
use std::path::Path;

const HEADERS: &[&str] = &[
    "id",
    "gem_type",
    "sender_domain",
    "thread_id",
    "score",
    "status",
    "summary",
    "confidence",
    "estimated_value",
    "urgency",
];

fn row_values(g: &Gem) -> [String; 10] {
    [
        g.id.to_string(),
        g.gem_type.as_str().to_string(),
        g.sender_domain.clone(),
        g.thread_id.clone().unwrap_or_default(),
        format!("{:.1}", g.score),
        g.status.as_str().to_string(),
        g.explanation.summary.clone(),
        format!("{:.2}", g.explanation.confidence),
        g.explanation.estimated_value.as_str().to_string(),
        g.explanation.urgency.as_str().to_string(),
    ]
}

pub fn write_csv(gems: &[Gem], path: &Path) -> AppResult<()> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(HEADERS)?;
    for g in gems {
        w.write_record(row_values(g))?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_excel(gems: &[Gem], path: &Path) -> AppResult<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, h) in HEADERS.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *h)
            .map_err(|e| AppError::Other(e.into()))?;
    }
    for (row, g) in gems.iter().enumerate() {
        for (col, v) in row_values(g).iter().enumerate() {
            sheet
                .write_string((row + 1) as u32, col as u16, v)
                .map_err(|e| AppError::Other(e.into()))?;
        }
    }
    workbook.save(path).map_err(|e| AppError::Other(e.into()))?;
    Ok(())
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::parse(format!("csv write error: {e}"))
    }
}
