pub mod api;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod ocr;
pub mod tasks;
pub mod workspace;
pub use error::{AppError, AppResult};
pub use workspace::Workspace;

/// Loads configuration, installs logging and connects to the annotation server.
pub fn bootstrap(server_override: Option<String>) -> AppResult<Workspace<api::HttpTransport>> {
    let mut config = config::load_app_config();
    if let Some(server_url) = server_override {
        config.server_url = server_url;
    }
    logging::init(config.log_filter.as_deref());
    tracing::info!(server = %config.server_url, "starting quizmark");
    Workspace::connect(config)
}
