use std::time::Duration;

/// Shared HTTP client constructor. Every upstream call carries a fixed
/// request timeout; there is no global run deadline.
pub fn build_http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}
