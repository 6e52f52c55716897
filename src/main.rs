use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match keyplane::cli::run_cli().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {}", keyplane::cli::render_error(&error));
            ExitCode::FAILURE
        }
    }
}
