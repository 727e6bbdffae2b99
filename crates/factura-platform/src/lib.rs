pub mod config;
pub mod http;
pub mod logging;

pub use config::{
    AppConfig, DriveConfig, Environment, NotifyConfig, PrestashopConfig, RenderConfig,
    SheetsConfig, SmtpConfig,
};
pub use http::build_http_client;
pub use logging::init_logging;
