use log::{error, info};
use service::{config::Config, logging::Logger};
use web::AppState;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting up social platform BFF in {} mode (auth: {}, data: {})...",
        config.runtime_env(),
        config.auth_url(),
        config.data_url()
    );

    let app_state = match AppState::from_config(config) {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to configure hosted backend gateways: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "Route rules: {}",
        app_state
            .route_policy
            .rules()
            .iter()
            .map(|rule| format!("{}={}", rule.prefix(), rule.class()))
            .collect::<Vec<_>>()
            .join(",")
    );

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with error: {e}");
        std::process::exit(1);
    }
}
