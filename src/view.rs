use crate::aggregate::{Aggregation, TOTAL_LABEL};
use crate::filter::Filter;
use crate::models::{DetailRecord, UnitAggregate, ValidationStatus};

/// Substring search on unit code or text; the grand-total row always stays.
pub fn filter_rows<'a>(rows: &'a [UnitAggregate], query: &str) -> Vec<&'a UnitAggregate> {
    let query = query.trim();
    if query.is_empty() {
        return rows.iter().collect();
    }
    let filter = Filter::Or(vec![
        Filter::contains("code", query),
        Filter::contains("text", query),
    ]);
    rows.iter()
        .filter(|row| row.is_total() || filter.matches(*row))
        .collect()
}

/// Every counted record across the unit rows, in unit order.
pub fn detail_table(aggregation: &Aggregation) -> Vec<&DetailRecord> {
    aggregation
        .unit_rows()
        .flat_map(|row| row.records.iter())
        .collect()
}

/// Records behind one cell of the summary table.
///
/// `unit` is a unit code, or `None`/the total label for the grand-total row;
/// `status` is `None` for the total column.
pub fn drill_down<'a>(
    aggregation: &'a Aggregation,
    unit: Option<&str>,
    status: Option<ValidationStatus>,
) -> Vec<&'a DetailRecord> {
    let mut clauses = Vec::new();
    if let Some(code) = unit.filter(|code| *code != TOTAL_LABEL) {
        let Some(text) = aggregation.lookup.text_for(code) else {
            return Vec::new();
        };
        clauses.push(Filter::eq("unit_text", text));
    }
    if let Some(status) = status {
        clauses.push(Filter::eq("status", status.code()));
    }

    let filter = Filter::And(clauses);
    detail_table(aggregation)
        .into_iter()
        .filter(|record| filter.matches(*record))
        .collect()
}

/// Substring search over the detail table.
pub fn search_details<'a>(records: Vec<&'a DetailRecord>, query: &str) -> Vec<&'a DetailRecord> {
    let query = query.trim();
    if query.is_empty() {
        return records;
    }
    let filter = Filter::Or(vec![
        Filter::contains("person_id", query),
        Filter::contains("unit_text", query),
        Filter::contains("submitted_by", query),
    ]);
    records
        .into_iter()
        .filter(|record| filter.matches(*record))
        .collect()
}
