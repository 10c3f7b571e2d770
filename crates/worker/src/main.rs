use std::io::Read;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fluxapp_core::config::WorkerConfig;
use fluxapp_core::job::{JobResponse, RunpodJob};
use fluxapp_worker::JobRunner;

/// Read one job envelope from stdin, run it, and write the response JSON
/// to stdout. Logs go to stderr.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fluxapp_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid worker configuration");
            respond(&JobResponse::Failed {
                error: e.to_string(),
            });
            std::process::exit(1);
        }
    };

    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        tracing::error!(error = %e, "Failed to read job from stdin");
        respond(&JobResponse::Failed {
            error: format!("Failed to read job input: {e}"),
        });
        std::process::exit(1);
    }

    let job: RunpodJob = match serde_json::from_str(&raw) {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(error = %e, "Malformed job envelope");
            respond(&JobResponse::Failed {
                error: format!("Malformed job envelope: {e}"),
            });
            std::process::exit(1);
        }
    };

    let runner = JobRunner::new(config);
    let response = runner.run(&job).await;
    respond(&response);
}

fn respond(response: &JobResponse) {
    let json = serde_json::to_string(response).expect("JobResponse is always serialisable");
    println!("{json}");
}
