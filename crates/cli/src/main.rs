use std::process::ExitCode;

fn main() -> ExitCode {
    fieldops_cli::run()
}
