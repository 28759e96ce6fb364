//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create a shared HTTP client with standard sift configuration.
///
/// Config: 10s connect timeout, caller-supplied request timeout, rustls TLS,
/// `sift/{version}` user-agent, redirect limit 10.
#[must_use]
pub fn client_with_timeout(request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(request_timeout)
        .user_agent(concat!("sift/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .unwrap_or_default()
}

/// Client with the default 60s request timeout.
#[must_use]
pub fn default_client() -> reqwest::Client {
    client_with_timeout(Duration::from_secs(60))
}
