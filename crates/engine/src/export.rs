//! Tabular export of the composed view.

use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    DataItem, EngineError, ResultEngine,
    money::{format_bps, margin_bps},
};

/// One line of the spreadsheet export. Columns of the other kind stay blank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub kind: &'static str,
    pub group_no: String,
    pub project_name: String,
    pub date: String,
    pub destination: String,
    pub person_in_charge: String,
    pub status: String,
    pub recruit_count: String,
    pub revenue: String,
    pub expense: String,
    pub profit: String,
    pub margin: String,
    pub created_at: String,
}

impl From<&DataItem> for ExportRow {
    fn from(item: &DataItem) -> Self {
        let profit = item.profit();
        let mut row = Self {
            kind: item.kind().as_str(),
            group_no: String::new(),
            project_name: String::new(),
            date: item.date().to_string(),
            destination: String::new(),
            person_in_charge: item.person_in_charge().to_string(),
            status: String::new(),
            recruit_count: String::new(),
            revenue: item.revenue().to_decimal_string(),
            expense: item.expense().to_decimal_string(),
            profit: profit.to_decimal_string(),
            margin: format_bps(margin_bps(profit, item.revenue()), 2),
            created_at: item.created_at().unwrap_or_default().to_string(),
        };
        match item {
            DataItem::Travel(group) => {
                row.group_no = group.group_no.clone();
                row.destination = group.destination.clone();
                row.status = group.status.as_str().to_string();
                row.recruit_count = group.recruit_count.to_string();
            }
            DataItem::Business(project) => {
                row.project_name = project.project_name.clone();
            }
        }
        row
    }
}

/// Rows for `items`, in order. An empty view has nothing to export.
pub fn export_rows(items: &[DataItem]) -> ResultEngine<Vec<ExportRow>> {
    if items.is_empty() {
        return Err(EngineError::Export("no records to export".to_string()));
    }
    Ok(items.iter().map(ExportRow::from).collect())
}

/// Writes `items` as CSV with a header line. Returns the number of rows.
pub fn write_csv<W: Write>(items: &[DataItem], writer: W) -> ResultEngine<usize> {
    let rows = export_rows(items)?;
    let mut csv = csv::Writer::from_writer(writer);
    for row in &rows {
        csv.serialize(row)?;
    }
    csv.flush()
        .map_err(|err| EngineError::Export(err.to_string()))?;
    Ok(rows.len())
}

/// `<prefix>_<YYYY-MM-DD>.csv`
pub fn file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}_{}.csv", date.format("%Y-%m-%d"))
}
