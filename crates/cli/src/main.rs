//! `coloracao` -- personal color analysis from the command line.
//!
//! # Environment variables
//!
//! | Variable                            | Required | Default        | Description                              |
//! |-------------------------------------|----------|----------------|------------------------------------------|
//! | `VITE_COLORACAO_SIMPLIFICADO_URL`   | yes      | --             | Submit/poll endpoint for all jobs        |
//! | `VITE_USERNAME`                     | yes      | --             | Login username, also the Basic-auth user |
//! | `VITE_PASSWORD`                     | yes      | --             | Login password                           |
//! | `VITE_TOKEN`                        | yes      | --             | Basic-auth secret                        |
//! | `VITE_N8N_UPLOAD_URL`               | no       | --             | Photo upload webhook                     |
//! | `COLORACAO_SESSION_DIR`             | no       | `~/.coloracao` | Where the login session is stored        |
//! | `COLORACAO_POLL_MAX_ATTEMPTS`       | no       | `60`           | Poll replies tolerated per job           |
//! | `COLORACAO_POLL_INITIAL_DELAY_MS`   | no       | `5000`         | First retry delay                        |
//! | `COLORACAO_POLL_MAX_DELAY_MS`       | no       | `15000`        | Retry delay cap                          |
//! | `COLORACAO_POLL_DELAY_INCREMENT_MS` | no       | `5000`         | Per-retry growth after the hold period   |
//! | `COLORACAO_TIMEOUT_SECS`            | no       | `180`          | Deadline for one submit + poll workflow  |
//! | `RUST_LOG`                          | no       | `coloracao=info` | Log filter                             |

use std::sync::Arc;

use clap::Parser;
use coloracao_cli::{App, Cli};
use coloracao_client::env::ProcessEnv;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coloracao=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Erro: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut app = App::from_env(Arc::new(ProcessEnv))?;
    let mut stdout = std::io::stdout();
    app.run(cli.command, &mut stdout).await
}
