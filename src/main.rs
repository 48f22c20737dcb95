// SPDX-License-Identifier: MPL-2.0

use inkwell::config::{APP_NAME, IS_DEVEL};
use inkwell::state::AppSettings;
use inkwell::{App, AppError, runtime};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let default_level = if IS_DEVEL { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("inkwell={default_level},warn").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = AppSettings::load().with_overrides(
        std::env::var("INKWELL_API_URL").ok(),
        std::env::var_os("INKWELL_DATA_DIR").map(PathBuf::from),
    );

    match runtime::block_on(run(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "{APP_NAME} stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: AppSettings) -> Result<(), AppError> {
    info!(api = %settings.api_url, devel = IS_DEVEL, "starting {APP_NAME}");
    let app = App::open(settings)?;

    let probe = app.start_connectivity_probe();
    if probe.is_none() {
        warn!("api url has no host, connectivity probe disabled");
    }

    match app.current_user().get() {
        Some(user) if app.is_signed_in() => info!(user = %user.username, "resuming session"),
        _ => info!("not signed in"),
    }
    app.schedule_feed_sync();

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
    }

    app.shutdown();
    if let Some(probe) = probe {
        probe.abort();
    }
    info!("bye");
    Ok(())
}
