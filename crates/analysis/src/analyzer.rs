use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spendwise_core::ExpenseRecord;
use spendwise_core::expense::validate_amount;

use crate::error::AnalysisError;

/// Top category reported for an empty record set.
pub const NO_TOP_CATEGORY: &str = "N/A";

/// Spend summary derived from a set of expenses. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub narrative: String,
    pub total_spent: f64,
    pub top_category: String,
    /// Per-category totals, iterated in lexicographic category order.
    pub category_totals: BTreeMap<String, f64>,
    pub record_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// Deterministic expense analysis.
///
/// Model:
/// - Total spent is a compensated (Neumaier) sum over every amount.
/// - Amounts are grouped by category in first-seen order.
/// - The top category is the first group reaching the maximum total.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpenseAnalyzer;

impl ExpenseAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Reject records whose amount is NaN, infinite or negative.
    pub fn validate(&self, records: &[ExpenseRecord]) -> Result<(), AnalysisError> {
        for record in records {
            validate_amount(record.amount).map_err(|e| AnalysisError::InvalidRecord {
                expense_id: record.id.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Summarize `records`.
    ///
    /// An empty slice yields a zero summary with top category [`NO_TOP_CATEGORY`].
    pub fn analyze(&self, records: &[ExpenseRecord]) -> Result<AnalysisSummary, AnalysisError> {
        self.validate(records)?;

        let mut total = CompensatedSum::default();
        // Insertion order matters for tie-breaking; the index maps a category to its slot.
        let mut groups: Vec<(&str, CompensatedSum)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();

        for record in records {
            total.add(record.amount);
            let slot = *slots.entry(record.category.as_str()).or_insert_with(|| {
                groups.push((record.category.as_str(), CompensatedSum::default()));
                groups.len() - 1
            });
            groups[slot].1.add(record.amount);
        }

        let mut top: Option<(&str, f64)> = None;
        for (category, sum) in &groups {
            let value = sum.value();
            match top {
                Some((_, best)) if value <= best => {}
                _ => top = Some((*category, value)),
            }
        }

        let total_spent = total.value();
        let top_category = top
            .map(|(category, _)| category.to_string())
            .unwrap_or_else(|| NO_TOP_CATEGORY.to_string());
        let category_totals: BTreeMap<String, f64> = groups
            .iter()
            .map(|(category, sum)| (category.to_string(), sum.value()))
            .collect();

        Ok(AnalysisSummary {
            narrative: narrative(total_spent, records.len(), &top_category),
            total_spent,
            top_category,
            category_totals,
            record_count: records.len(),
            computed_at: Utc::now(),
        })
    }
}

fn narrative(total: f64, count: usize, top_category: &str) -> String {
    if count == 0 {
        return "No expenses to analyze.".to_string();
    }
    let noun = if count == 1 { "expense" } else { "expenses" };
    format!(
        "You spent {total:.2} across {count} {noun}. Your top spending category is {top_category}."
    )
}

/// Neumaier compensated summation.
#[derive(Debug, Clone, Copy, Default)]
struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spendwise_core::{ExpenseId, OwnerId};

    fn expense(id: usize, amount: f64, category: &str) -> ExpenseRecord {
        ExpenseRecord {
            id: ExpenseId::parse(format!("exp-{id}")).unwrap(),
            owner_id: OwnerId::parse("owner-1").unwrap(),
            date: "2024-03-01".to_string(),
            amount,
            category: category.to_string(),
            status: "pending".to_string(),
            merchant: None,
            notes: None,
            created_at: None,
        }
    }

    #[test]
    fn food_and_transport_example() {
        let records = vec![
            expense(1, 10.0, "Food"),
            expense(2, 30.0, "Transport"),
            expense(3, 5.0, "Food"),
        ];

        let summary = ExpenseAnalyzer::new().analyze(&records).unwrap();

        assert_eq!(summary.total_spent, 45.0);
        assert_eq!(summary.top_category, "Transport");
        assert_eq!(summary.category_totals.get("Food"), Some(&15.0));
        assert_eq!(summary.category_totals.get("Transport"), Some(&30.0));
        assert_eq!(summary.record_count, 3);
    }

    #[test]
    fn narrative_mentions_total_count_and_top_category() {
        let records = vec![expense(1, 10.0, "Food"), expense(2, 30.0, "Transport")];
        let summary = ExpenseAnalyzer::new().analyze(&records).unwrap();

        assert!(summary.narrative.contains("40.00"));
        assert!(summary.narrative.contains("2 expenses"));
        assert!(summary.narrative.contains("Transport"));
    }

    #[test]
    fn ties_go_to_first_inserted_category() {
        let records = vec![
            expense(1, 20.0, "Zoo"),
            expense(2, 20.0, "Art"),
            expense(3, 5.0, "Misc"),
        ];
        let summary = ExpenseAnalyzer::new().analyze(&records).unwrap();
        assert_eq!(summary.top_category, "Zoo");
    }

    #[test]
    fn category_totals_iterate_lexicographically() {
        let records = vec![
            expense(1, 1.0, "Travel"),
            expense(2, 1.0, "Food"),
            expense(3, 1.0, "Office"),
        ];
        let summary = ExpenseAnalyzer::new().analyze(&records).unwrap();
        let keys: Vec<&str> = summary.category_totals.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Food", "Office", "Travel"]);
    }

    #[test]
    fn empty_input_reports_no_top_category() {
        let summary = ExpenseAnalyzer::new().analyze(&[]).unwrap();
        assert_eq!(summary.total_spent, 0.0);
        assert_eq!(summary.top_category, NO_TOP_CATEGORY);
        assert!(summary.category_totals.is_empty());
    }

    #[test]
    fn malformed_amounts_are_invalid_records() {
        for bad in [f64::NAN, -1.0, f64::INFINITY] {
            let records = vec![expense(1, 3.0, "Food"), expense(2, bad, "Food")];
            let err = ExpenseAnalyzer::new().analyze(&records).unwrap_err();
            match err {
                AnalysisError::InvalidRecord { expense_id, .. } => {
                    assert_eq!(expense_id.as_str(), "exp-2")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn compensated_sum_keeps_small_amounts() {
        let mut records = vec![expense(0, 1.0e16, "Big")];
        for i in 1..=10 {
            records.push(expense(i, 1.0, "Small"));
        }
        let summary = ExpenseAnalyzer::new().analyze(&records).unwrap();
        assert_eq!(summary.total_spent, 1.0e16 + 10.0);
    }

    fn categories() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("Food"),
            Just("Transport"),
            Just("Office"),
            Just("Travel"),
            Just("Misc"),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: integer-valued amounts sum exactly, so the total must match.
        #[test]
        fn total_equals_sum_of_amounts(
            rows in prop::collection::vec((0u32..1_000_000u32, categories()), 1..40)
        ) {
            let records: Vec<ExpenseRecord> = rows
                .iter()
                .enumerate()
                .map(|(i, (amount, category))| expense(i, *amount as f64, category))
                .collect();
            let expected: f64 = rows.iter().map(|(a, _)| *a as f64).sum();

            let summary = ExpenseAnalyzer::new().analyze(&records).unwrap();
            prop_assert_eq!(summary.total_spent, expected);
        }

        /// Property: a strict maximum category is always reported as top.
        #[test]
        fn strict_maximum_is_top_category(
            rows in prop::collection::vec((0u32..1_000u32, categories()), 0..30),
            boost in 1u32..1_000u32,
        ) {
            let mut records: Vec<ExpenseRecord> = rows
                .iter()
                .enumerate()
                .map(|(i, (amount, category))| expense(i, *amount as f64, category))
                .collect();
            // "Winner" is a fresh category strictly above any other total.
            let others: f64 = rows.iter().map(|(a, _)| *a as f64).sum();
            records.push(expense(rows.len(), others + boost as f64, "Winner"));

            let summary = ExpenseAnalyzer::new().analyze(&records).unwrap();
            prop_assert_eq!(summary.top_category.as_str(), "Winner");
        }

        /// Property: analysis is idempotent up to the timestamp.
        #[test]
        fn analysis_is_idempotent(
            rows in prop::collection::vec((0u32..10_000u32, categories()), 1..20)
        ) {
            let records: Vec<ExpenseRecord> = rows
                .iter()
                .enumerate()
                .map(|(i, (amount, category))| expense(i, *amount as f64 / 100.0, category))
                .collect();
            let analyzer = ExpenseAnalyzer::new();
            let a = analyzer.analyze(&records).unwrap();
            let b = analyzer.analyze(&records).unwrap();

            prop_assert_eq!(a.total_spent, b.total_spent);
            prop_assert_eq!(&a.top_category, &b.top_category);
            prop_assert_eq!(&a.category_totals, &b.category_totals);
            prop_assert_eq!(&a.narrative, &b.narrative);
        }
    }
}
