use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{
    DetailRecord, OrganizationalUnit, RowKind, StatusCounts, UnitAggregate, ValidationStatus,
};

pub const TOTAL_LABEL: &str = "Total";

/// Code/text lookup over the unit catalog.
///
/// Texts carried by more than one code are kept out of the reverse direction,
/// so records naming them are attributed to no unit. A code listed twice keeps
/// its first catalog entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitLookup {
    text_by_code: HashMap<String, String>,
    code_by_text: HashMap<String, String>,
    ambiguous: Vec<String>,
    duplicate_codes: Vec<String>,
}

impl UnitLookup {
    pub fn build(units: &[OrganizationalUnit]) -> Self {
        let mut codes_by_text: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut text_by_code = HashMap::new();
        let mut duplicate_codes = Vec::new();
        for unit in units {
            if text_by_code.contains_key(&unit.code) {
                tracing::warn!(code = %unit.code, text = %unit.text, "unit code listed twice; later entry ignored");
                if !duplicate_codes.contains(&unit.code) {
                    duplicate_codes.push(unit.code.clone());
                }
                continue;
            }
            text_by_code.insert(unit.code.clone(), unit.text.clone());
            let codes = codes_by_text.entry(unit.text.as_str()).or_default();
            codes.push(unit.code.as_str());
        }

        let mut code_by_text = HashMap::new();
        let mut ambiguous = Vec::new();
        for (text, codes) in codes_by_text {
            if let [code] = codes.as_slice() {
                code_by_text.insert(text.to_string(), code.to_string());
            } else {
                tracing::warn!(text, codes = ?codes, "unit text shared by several codes; records ignored");
                ambiguous.push(text.to_string());
            }
        }

        Self {
            text_by_code,
            code_by_text,
            ambiguous,
            duplicate_codes,
        }
    }

    pub fn code_for(&self, text: &str) -> Option<&str> {
        self.code_by_text.get(text).map(String::as_str)
    }

    pub fn text_for(&self, code: &str) -> Option<&str> {
        self.text_by_code.get(code).map(String::as_str)
    }

    pub fn ambiguous_texts(&self) -> &[String] {
        &self.ambiguous
    }

    pub fn duplicate_codes(&self) -> &[String] {
        &self.duplicate_codes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Unit rows sorted by code, grand total last.
    pub rows: Vec<UnitAggregate>,
    pub lookup: UnitLookup,
    pub dropped_records: usize,
}

impl Aggregation {
    pub fn ambiguous_texts(&self) -> &[String] {
        self.lookup.ambiguous_texts()
    }

    pub fn duplicate_codes(&self) -> &[String] {
        self.lookup.duplicate_codes()
    }

    pub fn unit_rows(&self) -> impl Iterator<Item = &UnitAggregate> {
        self.rows.iter().filter(|row| !row.is_total())
    }
}

pub fn aggregate(records: &[DetailRecord], units: &[OrganizationalUnit]) -> Aggregation {
    let lookup = UnitLookup::build(units);

    let mut by_code: BTreeMap<String, UnitAggregate> = BTreeMap::new();
    for unit in units {
        by_code
            .entry(unit.code.clone())
            .or_insert_with(|| UnitAggregate::empty(unit));
    }

    let mut seen: HashMap<String, HashSet<String>> = HashMap::new();
    let mut dropped = 0usize;

    for record in records {
        let (Some(text), Some(person)) = (record.unit_text.as_deref(), record.person_id.as_deref())
        else {
            dropped += 1;
            continue;
        };
        let Some(entry) = lookup
            .code_for(text)
            .and_then(|code| by_code.get_mut(code))
        else {
            dropped += 1;
            continue;
        };

        let persons = seen.entry(entry.code.clone()).or_default();
        if !persons.insert(person.to_string()) {
            dropped += 1;
            continue;
        }

        if let Some(status) = ValidationStatus::from_code(&record.status) {
            entry.counts.bump(status);
        }
        entry.total += 1;
        entry.records.push(record.clone());
    }

    let mut rows: Vec<UnitAggregate> = by_code.into_values().collect();
    for row in rows.iter_mut() {
        row.no_action_yet = row.population.unwrap_or(0) - row.total;
    }

    let total = total_row(&rows);
    rows.push(total);

    tracing::info!(
        units = rows.len() - 1,
        records = records.len(),
        dropped,
        "aggregation complete"
    );

    Aggregation {
        rows,
        lookup,
        dropped_records: dropped,
    }
}

fn total_row(rows: &[UnitAggregate]) -> UnitAggregate {
    let mut counts = StatusCounts::default();
    let mut total = 0;
    let mut no_action_yet = 0;
    let mut population = 0;

    for row in rows {
        counts.add(&row.counts);
        total += row.total;
        no_action_yet += row.no_action_yet;
        population += row.population.unwrap_or(0);
    }

    UnitAggregate {
        kind: RowKind::Total,
        code: TOTAL_LABEL.to_string(),
        text: TOTAL_LABEL.to_string(),
        counts,
        total,
        population: Some(population),
        no_action_yet,
        records: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(code: &str, population: Option<i64>) -> OrganizationalUnit {
        OrganizationalUnit {
            code: code.to_string(),
            text: format!("{code} Text"),
            population,
        }
    }

    fn record(person: &str, unit_text: &str, status: &str) -> DetailRecord {
        DetailRecord {
            person_id: Some(person.to_string()),
            unit_text: Some(unit_text.to_string()),
            status: status.to_string(),
            last_modified: None,
            submitted_by: None,
            approver: None,
        }
    }

    #[test]
    fn duplicate_person_counts_once() {
        let units = vec![unit("IC1", Some(5))];
        let records = vec![record("P1", "IC1 Text", "A"), record("P1", "IC1 Text", "R")];

        let result = aggregate(&records, &units);
        let ic1 = &result.rows[0];
        assert_eq!(ic1.counts.approved, 1);
        assert_eq!(ic1.counts.rejected, 0);
        assert_eq!(ic1.total, 1);
        assert_eq!(ic1.no_action_yet, 4);
        assert_eq!(ic1.records.len(), 1);
        assert_eq!(ic1.records[0].status, "A");
        assert_eq!(result.dropped_records, 1);
    }

    #[test]
    fn same_person_in_two_units_counts_in_each() {
        let units = vec![unit("IC1", Some(2)), unit("IC2", Some(2))];
        let records = vec![record("P1", "IC1 Text", "A"), record("P1", "IC2 Text", "D")];
        let result = aggregate(&records, &units);
        assert_eq!(result.rows[0].total, 1);
        assert_eq!(result.rows[1].total, 1);
    }

    #[test]
    fn empty_records_yield_zero_rows_and_total() {
        let units = vec![unit("IC2", Some(3))];
        let result = aggregate(&[], &units);

        assert_eq!(result.rows.len(), 2);
        let ic2 = &result.rows[0];
        assert_eq!(ic2.code, "IC2");
        assert_eq!(ic2.counts, StatusCounts::default());
        assert_eq!(ic2.no_action_yet, 3);

        let total = result.rows.last().unwrap();
        assert_eq!(total.code, TOTAL_LABEL);
        assert_eq!(total.counts, StatusCounts::default());
        assert_eq!(total.total, 0);
        assert_eq!(total.no_action_yet, 3);
        assert_eq!(total.population, Some(3));
    }

    #[test]
    fn unrecognized_status_counts_toward_total_only() {
        let units = vec![unit("IC1", Some(4))];
        let records = vec![record("P1", "IC1 Text", "ZZ"), record("P2", "IC1 Text", "PA")];
        let result = aggregate(&records, &units);
        let ic1 = &result.rows[0];
        assert_eq!(ic1.counts.sum(), 1);
        assert_eq!(ic1.counts.pending_approval, 1);
        assert_eq!(ic1.total, 2);
        assert_eq!(ic1.no_action_yet, 2);
    }

    #[test]
    fn unmatched_and_incomplete_records_are_dropped_silently() {
        let units = vec![unit("IC1", Some(10))];
        let mut missing_person = record("P9", "IC1 Text", "A");
        missing_person.person_id = None;
        let mut missing_unit = record("P8", "IC1 Text", "A");
        missing_unit.unit_text = None;
        let records = vec![
            record("P1", "Excluded Unit", "A"),
            missing_person,
            missing_unit,
            record("P2", "IC1 Text", "SA"),
        ];

        let result = aggregate(&records, &units);
        assert_eq!(result.rows[0].total, 1);
        assert_eq!(result.rows[0].counts.self_approved, 1);
        assert_eq!(result.rows.last().unwrap().total, 1);
        assert_eq!(result.dropped_records, 3);
    }

    #[test]
    fn rows_sorted_by_code_with_total_last() {
        let units = vec![unit("IC3", Some(1)), unit("IC1", Some(1)), unit("IC2", Some(1))];
        let records = vec![record("P1", "IC3 Text", "A")];
        let result = aggregate(&records, &units);

        let codes: Vec<&str> = result.rows.iter().map(|row| row.code.as_str()).collect();
        assert_eq!(codes, vec!["IC1", "IC2", "IC3", TOTAL_LABEL]);
        assert_eq!(result.rows.len(), units.len() + 1);
        assert!(result.rows.last().unwrap().is_total());
    }

    #[test]
    fn buckets_plus_no_action_equal_population() {
        let units = vec![unit("IC1", Some(10)), unit("IC2", Some(6))];
        let records = vec![
            record("P1", "IC1 Text", "D"),
            record("P2", "IC1 Text", "PA"),
            record("P3", "IC1 Text", "A"),
            record("P4", "IC2 Text", "SA"),
            record("P5", "IC2 Text", "R"),
            record("P5", "IC2 Text", "A"),
        ];
        let result = aggregate(&records, &units);
        for row in &result.rows {
            assert_eq!(
                row.counts.sum() + row.no_action_yet,
                row.population.unwrap(),
                "row {}",
                row.code
            );
        }
        let total = result.rows.last().unwrap();
        assert_eq!(total.population, Some(16));
        assert_eq!(total.total, 5);
    }

    #[test]
    fn missing_population_goes_negative() {
        let units = vec![unit("IC1", None)];
        let records = vec![record("P1", "IC1 Text", "A"), record("P2", "IC1 Text", "A")];
        let result = aggregate(&records, &units);
        assert_eq!(result.rows[0].no_action_yet, -2);
        assert_eq!(result.rows.last().unwrap().population, Some(0));
    }

    #[test]
    fn shared_text_attributes_to_no_unit() {
        let mut units = vec![unit("IC1", Some(3)), unit("IC2", Some(3))];
        units[1].text = "IC1 Text".to_string();
        let records = vec![record("P1", "IC1 Text", "A")];

        let result = aggregate(&records, &units);
        assert_eq!(result.ambiguous_texts(), ["IC1 Text".to_string()]);
        assert!(result.unit_rows().all(|row| row.total == 0));
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn repeated_code_keeps_first_entry_and_is_reported() {
        let mut repeat = unit("IC1", Some(7));
        repeat.text = "IC1 Other".to_string();
        let units = vec![unit("IC1", Some(5)), repeat, unit("IC2", Some(2))];
        let records = vec![record("P1", "IC1 Text", "A"), record("P2", "IC1 Other", "A")];

        let result = aggregate(&records, &units);

        assert_eq!(result.duplicate_codes(), ["IC1".to_string()]);
        assert_eq!(result.rows.len(), 3);
        let ic1 = &result.rows[0];
        assert_eq!(ic1.text, "IC1 Text");
        assert_eq!(ic1.population, Some(5));
        assert_eq!(ic1.total, 1);
        assert_eq!(result.rows.last().unwrap().population, Some(7));
        assert_eq!(result.dropped_records, 1);
    }

    #[test]
    fn lookup_resolves_both_directions() {
        let lookup = UnitLookup::build(&[unit("IC1", None)]);
        assert_eq!(lookup.code_for("IC1 Text"), Some("IC1"));
        assert_eq!(lookup.text_for("IC1"), Some("IC1 Text"));
        assert_eq!(lookup.code_for("nope"), None);
    }
}
