//! Launch Chrome and print what the DevTools endpoint reports about itself
//!
//! Run with `cargo run --example basic_cdp`. Set `CHROME_BIN` when Chrome
//! is not on the PATH, or `CHROME_WS_URL` to reuse a running browser.

use browser::{Browser, BrowserConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = BrowserConfig {
        ws_url: std::env::var("CHROME_WS_URL").ok(),
        ..BrowserConfig::default()
    };
    let browser = Browser::start(&config).await?;
    let client = browser.client();

    let version = client.send_request("Browser.getVersion", None, None).await?;
    println!("Browser: {}", version["product"]);
    println!("Protocol: {}", version["protocolVersion"]);

    let targets = client.send_request("Target.getTargets", None, None).await?;
    if let Some(infos) = targets["targetInfos"].as_array() {
        for info in infos {
            println!("  {} {} {}", info["targetId"], info["type"], info["url"]);
        }
    }

    let page = browser.new_page().await?;
    println!("Opened page {}, {} session route(s)", page.target_id(), client.route_count());
    page.close().await?;

    Ok(())
}
