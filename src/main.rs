#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use console_session::config::Config;
use console_session::{ClientBuilder, ClientError, TokenState, telemetry};
use tracing::Instrument;

const EMAIL_ENV: &str = "CONSOLE_EMAIL";
const PASSWORD_ENV: &str = "CONSOLE_PASSWORD";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let result = run(config).instrument(tracing::info_span!("console_session")).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Session check failed");
    }

    telemetry_guard.shutdown();
    result
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(api = %config.api.base_url, "Starting session check");
    let client = ClientBuilder::new(config).build().await?;

    if !client.session().is_authenticated() {
        match (std::env::var(EMAIL_ENV), std::env::var(PASSWORD_ENV)) {
            (Ok(email), Ok(password)) => {
                let response = client.auth().login(&email, &password).await?;
                tracing::info!(user.id = %response.user.id, "Signed in");
            }
            _ => {
                tracing::info!("No stored session and no credentials in {EMAIL_ENV}/{PASSWORD_ENV}, nothing to do");
                return Ok(());
            }
        }
    }

    let state = client.token_state();
    tracing::info!(state = ?state, "Restored session");
    if state != TokenState::Valid {
        match client.ensure_fresh_session().await {
            Ok(refreshed) => tracing::info!(refreshed, "Session checked"),
            Err(ClientError::SessionExpired) => {
                tracing::warn!("Session expired, sign in again");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    let user = client.auth().current_user().await?;
    tracing::info!(
        user.id = %user.id,
        user.role = ?user.role,
        locale = %client.locale().current(),
        "Session is valid"
    );

    match client.agents().manageable_agents().await {
        Ok(agents) => tracing::info!(count = agents.len(), "Manageable agents loaded"),
        Err(e) => tracing::warn!(error = %e, "Failed to load manageable agents"),
    }

    Ok(())
}
