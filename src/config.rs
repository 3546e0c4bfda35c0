use std::net::SocketAddr;

use serde::Deserialize;

/// Default number of access codes tried before giving up on a digest collision.
const fn default_code_attempts() -> u32 {
    5
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub listen_address: Option<SocketAddr>,
    /// SQLite connection URL, e.g. `sqlite://data/anonreport.db`.
    pub db: String,
    pub cors: CorsConfig,
    pub admin: AdminConfig,
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
    #[serde(default)]
    pub metrics: Option<MetricConfig>,
}

#[derive(Deserialize, Debug, Clone)]
/// Cross-origin settings.
pub struct CorsConfig {
    /// The single origin permitted to make credentialed requests.
    pub origin: String,
}

#[derive(Deserialize, Clone)]
/// Fixed credential pair checked by the admin login route.
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricConfig {
    Prometheus(PrometheusConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PrometheusConfig {
    /// Address the scrape endpoint listens on.
    pub listen_address: SocketAddr,
}
