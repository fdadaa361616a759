//! Text rendering of job states, summaries and expense rows.

use std::fmt::Write as _;

use spendwise_analysis::{AnalysisError, AnalysisSummary, JobState};
use spendwise_core::ExpenseRecord;

/// Copy shown when a run ends without a summary.
pub const RETRY_HINT: &str = "Run the command again to retry.";

/// Copy shown when the input itself has to change.
pub const FIX_INPUT_HINT: &str = "Fix the expenses and run the command again.";

/// One user-facing line (or block, for a summary) per state.
pub fn state(state: &JobState, max_attempts: u32) -> String {
    match state {
        JobState::Idle => "Analysis cancelled.".to_string(),
        JobState::Running { attempt } => format!(
            "Analyzing your expenses (check {} of {max_attempts})...",
            attempt + 1
        ),
        JobState::Succeeded { result } => summary(result),
        JobState::Failed { reason } => format!("Analysis failed: {reason}. {RETRY_HINT}"),
        JobState::TimedOut => format!("Analysis is still unavailable. {RETRY_HINT}"),
    }
}

/// Why a run could not be started, with the matching recovery hint.
pub fn start_error(err: &AnalysisError) -> String {
    let hint = if err.is_retryable() {
        RETRY_HINT
    } else {
        FIX_INPUT_HINT
    };
    format!("Could not start analysis: {err}. {hint}")
}

pub fn summary(summary: &AnalysisSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary.narrative);
    let _ = writeln!(out, "  Total spent:  {:.2}", summary.total_spent);
    let _ = writeln!(out, "  Top category: {}", summary.top_category);
    if !summary.category_totals.is_empty() {
        let width = summary
            .category_totals
            .keys()
            .map(|k| k.chars().count())
            .max()
            .unwrap_or(0);
        let _ = writeln!(out, "  By category:");
        for (category, total) in &summary.category_totals {
            let _ = writeln!(out, "    {category:<width$}  {total:>10.2}");
        }
    }
    let _ = write!(
        out,
        "  Computed at:  {}",
        summary.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out
}

pub fn expense(record: &ExpenseRecord) -> String {
    let mut line = format!(
        "{}  {:>10.2}  {:<16}  {:<10}  {}",
        record.date, record.amount, record.category, record.status, record.id
    );
    if let Some(merchant) = &record.merchant {
        let _ = write!(line, "  ({merchant})");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendwise_analysis::ExpenseAnalyzer;
    use spendwise_core::{ExpenseId, OwnerId};

    fn record(id: &str, amount: f64, category: &str) -> ExpenseRecord {
        ExpenseRecord::new(
            ExpenseId::parse(id).unwrap(),
            OwnerId::parse("alice").unwrap(),
            "2024-03-01",
            amount,
            category,
        )
        .unwrap()
    }

    #[test]
    fn failed_and_timed_out_offer_different_copy() {
        let failed = state(
            &JobState::Failed {
                reason: "backend returned 502".to_string(),
            },
            5,
        );
        let timed_out = state(&JobState::TimedOut, 5);

        assert!(failed.contains("backend returned 502"));
        assert!(failed.ends_with(RETRY_HINT));
        assert!(timed_out.contains("still unavailable"));
        assert!(timed_out.ends_with(RETRY_HINT));
        assert_ne!(failed, timed_out);
    }

    #[test]
    fn start_errors_pick_hint_by_retryability() {
        let empty = start_error(&AnalysisError::NoDataToAnalyze);
        let backend = start_error(&AnalysisError::BackendQueryFailed {
            reason: "timeout".to_string(),
        });

        assert!(empty.contains("no expenses to analyze"));
        assert!(empty.ends_with(FIX_INPUT_HINT));
        assert!(backend.ends_with(RETRY_HINT));
    }

    #[test]
    fn running_counts_checks_from_one() {
        assert_eq!(
            state(&JobState::Running { attempt: 0 }, 5),
            "Analyzing your expenses (check 1 of 5)..."
        );
    }

    #[test]
    fn summary_lists_categories_in_lexicographic_order() {
        let result = ExpenseAnalyzer::new()
            .analyze(&[
                record("a", 10.0, "Transport"),
                record("b", 5.5, "Food"),
                record("c", 2.0, "Books"),
            ])
            .unwrap();

        let text = state(&JobState::Succeeded { result }, 5);
        let books = text.find("Books").unwrap();
        let food = text.find("Food").unwrap();
        let transport = text.rfind("Transport").unwrap();

        assert!(text.starts_with("You spent 17.50 across 3 expenses."));
        assert!(text.contains("Top category: Transport"));
        assert!(books < food && food < transport);
    }

    #[test]
    fn empty_summary_has_no_category_block() {
        let result = ExpenseAnalyzer::new().analyze(&[]).unwrap();
        let text = summary(&result);

        assert!(text.contains("Top category: N/A"));
        assert!(!text.contains("By category"));
    }

    #[test]
    fn expense_line_includes_merchant_when_present() {
        let line = expense(&record("exp-1", 12.0, "Food").with_merchant("Cafe"));
        assert!(line.starts_with("2024-03-01"));
        assert!(line.contains("12.00"));
        assert!(line.ends_with("(Cafe)"));
    }
}
