use crate::commands::{bootstrap_failure, runtime, CommandResult};
use fieldops_core::config::LoadOptions;
use fieldops_core::domain::sync::{SyncRunStatus, SyncTrigger};
use fieldops_server::bootstrap::bootstrap;

/// Runs one payment poll cycle, the same one `GET /api/v1/billing/poll` triggers.
pub fn run(options: &LoadOptions) -> CommandResult {
    let runtime = match runtime("poll") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let app = match bootstrap(options.clone()).await {
            Ok(app) => app,
            Err(error) => return bootstrap_failure("poll", error),
        };

        let outcome = app.services.poller.run_cycle(SyncTrigger::Cli).await;
        app.db_pool.close().await;

        let run = match outcome {
            Ok(run) => run,
            Err(error) => return CommandResult::failure("poll", "persistence", error.to_string(), 9),
        };
        let message = format!(
            "poll {}: {} proposals checked, {} stages paid, {} errors",
            run.status.as_str(),
            run.proposals_checked,
            run.stages_paid,
            run.errors.len()
        );
        let details = serde_json::to_value(&run).ok();
        if run.status == SyncRunStatus::Failed {
            CommandResult::failure_with_details("poll", "poll_failed", message, 8, details)
        } else {
            CommandResult::success_with_details("poll", message, details)
        }
    })
}
