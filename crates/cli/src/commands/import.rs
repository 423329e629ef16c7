use std::fs;
use std::path::Path;

use crate::commands::{bootstrap_failure, runtime, CommandResult};
use fieldops_core::config::LoadOptions;
use fieldops_server::bootstrap::bootstrap;
use fieldops_server::submissions::import_csv;

/// Reconciles a CSV export of field reports against the database.
pub fn run(options: &LoadOptions, path: &Path) -> CommandResult {
    let input = match fs::read_to_string(path) {
        Ok(input) => input,
        Err(error) => {
            return CommandResult::failure(
                "import",
                "input_read",
                format!("could not read `{}`: {error}", path.display()),
                6,
            );
        }
    };

    let runtime = match runtime("import") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let app = match bootstrap(options.clone()).await {
            Ok(app) => app,
            Err(error) => return bootstrap_failure("import", error),
        };

        let result = import_csv(&app.services.submissions, &input).await;
        app.db_pool.close().await;

        let message = format!(
            "processed {} submissions: {} jobs matched, {} created, {} notes added, {} updated, {} materials added, {} errors",
            result.submissions_processed,
            result.jobs_matched,
            result.jobs_created,
            result.notes_added,
            result.notes_updated,
            result.materials_added,
            result.errors.len()
        );
        let details = serde_json::to_value(&result).ok();
        if result.success {
            CommandResult::success_with_details("import", message, details)
        } else {
            CommandResult::failure_with_details("import", "reconcile", message, 8, details)
        }
    })
}
