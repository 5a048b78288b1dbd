//! Simple example of using rotating-proxy-pool.

use reqwest_middleware::ClientBuilder;
use rotating_proxy_pool::{utils, ProxyPoolConfig, RotatingProxyMiddleware};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // one address per line, `#` starts a comment
    let proxies = match std::env::args().nth(1) {
        Some(path) => utils::load_proxy_list(path)?,
        None => vec![
            "http://127.0.0.1:8080".to_string(),
            "socks5://127.0.0.1:1080".to_string(),
        ],
    };

    println!("Initializing proxy pool with {} proxies...", proxies.len());

    let config = ProxyPoolConfig::builder()
        .proxies(proxies)
        .backoff_base(Duration::from_secs(5))
        .backoff_cap(Duration::from_secs(600))
        .max_proxies_to_try(3)
        .request_timeout(Duration::from_secs(10))
        .build();

    let middleware = RotatingProxyMiddleware::new(config).await;
    let pool = middleware.pool().clone();

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(middleware)
        .build();

    println!("Sending request...");
    match client.get("https://httpbin.org/ip").send().await {
        Ok(response) => {
            println!("Status: {}", response.status());
            println!("Response: {}", response.text().await?);
        }
        Err(e) => println!("Request failed: {}", e),
    }

    println!("{}", pool);
    println!("Next sweep worth waiting for: {:?}", pool.mean_backoff_time());

    Ok(())
}
