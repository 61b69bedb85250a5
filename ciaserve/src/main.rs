mod application;
mod logging;
mod presentation;

use std::process::ExitCode;

use ciaserve_core::ShareError;

#[tokio::main]
async fn main() -> ExitCode {
    match application::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ ShareError::Bind { .. }) => {
            eprintln!(
                "ERROR: {e}\ntry another --port, or change your IP settings by editing or deleting the '{}' file",
                application::address::OVERRIDE_FILE
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
