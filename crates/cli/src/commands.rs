use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use spendwise_analysis::{
    AnalysisJobController, DeterministicBackend, ExpenseAnalyzer, JobState, JobStatusBackend,
    PollPolicy,
};
use spendwise_core::{ExpenseRecord, OwnerId};
use spendwise_infra::{AppConfig, ExpenseStore, HttpJobStatusBackend, RestExpenseStore};

use crate::AnalyzeArgs;
use crate::render;

/// Exit code for a run that ran out of polls.
const EXIT_TIMED_OUT: u8 = 3;
/// Exit code when `start` rejected the input.
const EXIT_NOT_STARTED: u8 = 4;

pub async fn analyze(
    config: &AppConfig,
    args: AnalyzeArgs,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let expenses = match (&args.file, &args.owner) {
        (Some(path), _) => read_expenses(path)?,
        (None, Some(owner)) => fetch_expenses(config, owner).await?,
        (None, None) => anyhow::bail!("either --file or --owner is required"),
    };

    let policy = poll_policy(config.poll, &args);
    let backend = job_backend(config, args.local);
    let controller = AnalysisJobController::new(backend, policy);
    let mut updates = controller.subscribe();

    let run_id = match controller.start(expenses) {
        Ok(run_id) => run_id,
        Err(err) => {
            tracing::warn!(error = %err, retryable = err.is_retryable(), "analysis not started");
            eprintln!("{}", render::start_error(&err));
            return Ok(ExitCode::from(EXIT_NOT_STARTED));
        }
    };
    tracing::info!(run_id = %run_id, max_attempts = policy.max_attempts, "analysis started");

    let mut interrupted = false;
    let last = loop {
        let next = tokio::select! {
            state = updates.next() => state,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                controller.cancel();
                continue;
            }
        };
        let Some(state) = next else {
            anyhow::bail!("analysis controller stopped publishing");
        };

        if json {
            println!("{}", serde_json::to_string(&state)?);
        } else {
            println!("{}", render::state(&state, policy.max_attempts));
        }
        if state.is_settled() {
            break state;
        }
    };

    Ok(match last {
        JobState::Succeeded { .. } => ExitCode::SUCCESS,
        JobState::TimedOut => ExitCode::from(EXIT_TIMED_OUT),
        JobState::Idle => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

pub fn summarize(path: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let expenses = read_expenses(path)?;
    let summary = ExpenseAnalyzer::new().analyze(&expenses)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", render::summary(&summary));
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn list(config: &AppConfig, owner: &str, json: bool) -> anyhow::Result<ExitCode> {
    let expenses = fetch_expenses(config, owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
    } else if expenses.is_empty() {
        println!("No expenses recorded.");
    } else {
        for expense in &expenses {
            println!("{}", render::expense(expense));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn read_expenses(path: &Path) -> anyhow::Result<Vec<ExpenseRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let expenses: Vec<ExpenseRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of expenses", path.display()))?;

    for expense in &expenses {
        expense
            .validate()
            .with_context(|| format!("invalid expense {}", expense.id))?;
    }
    tracing::debug!(path = %path.display(), count = expenses.len(), "loaded expenses");
    Ok(expenses)
}

async fn fetch_expenses(config: &AppConfig, owner: &str) -> anyhow::Result<Vec<ExpenseRecord>> {
    let owner_id = OwnerId::parse(owner)?;
    let store = RestExpenseStore::new(config.require_backend()?.clone());
    let expenses = store
        .fetch_all(&owner_id)
        .await
        .with_context(|| format!("failed to fetch expenses of {owner_id}"))?;
    Ok(expenses)
}

fn poll_policy(base: PollPolicy, args: &AnalyzeArgs) -> PollPolicy {
    let mut policy = base;
    if let Some(attempts) = args.max_attempts {
        policy = policy.with_max_attempts(attempts);
    }
    if let Some(ms) = args.poll_interval_ms {
        policy = policy.with_poll_interval(Duration::from_millis(ms));
    }
    if let Some(ms) = args.submission_delay_ms {
        policy = policy.with_submission_delay(Duration::from_millis(ms));
    }
    policy
}

fn job_backend(config: &AppConfig, force_local: bool) -> Arc<dyn JobStatusBackend> {
    match (&config.backend, force_local) {
        (Some(backend), false) => Arc::new(HttpJobStatusBackend::new(backend.clone())),
        _ => {
            tracing::info!(
                complete_from_attempt = ?config.complete_from_attempt,
                "using local placeholder analysis backend"
            );
            Arc::new(match config.complete_from_attempt {
                Some(attempt) => DeterministicBackend::completing_at(attempt),
                None => DeterministicBackend::never_completing(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> AnalyzeArgs {
        AnalyzeArgs {
            file: None,
            owner: Some("alice".to_string()),
            local: false,
            max_attempts: None,
            poll_interval_ms: None,
            submission_delay_ms: None,
        }
    }

    #[test]
    fn flags_override_configured_policy() {
        let base = PollPolicy::default();
        let policy = poll_policy(
            base,
            &AnalyzeArgs {
                max_attempts: Some(2),
                poll_interval_ms: Some(50),
                ..args()
            },
        );

        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.poll_interval, Duration::from_millis(50));
        assert_eq!(policy.submission_delay, base.submission_delay);
    }

    #[test]
    fn read_expenses_rejects_invalid_rows() {
        let dir = std::env::temp_dir().join(format!("spendwise-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(
            &path,
            concat!(
                r#"[{"id":"a","user_id":"alice","date":"2024-01-01","#,
                r#""amount":-4.0,"category":"Food","status":"pending"}]"#
            ),
        )
        .unwrap();

        let err = read_expenses(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid expense a"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn fetching_without_backend_names_the_missing_variable() {
        let err = fetch_expenses(&AppConfig::default(), "alice").await.unwrap_err();
        assert!(err.to_string().contains("SPENDWISE_BACKEND_URL"));
    }
}
