//! Load a page with interception and print what went over the wire
//!
//! Run with `cargo run --example render_page -- https://www.cbd.int/`.

use browser::{
    BrowserConfig, BrowserPool, InterceptedRequest, NavigateOptions, NetworkObserver,
    RequestDecision, ResourceType, ResponseMeta,
};

/// Lets everything through except images and logs the traffic
#[derive(Default)]
struct TrafficLog {
    continued: usize,
    aborted: usize,
    stylesheets: Vec<(String, usize)>,
}

impl NetworkObserver for TrafficLog {
    fn on_request(&mut self, request: &InterceptedRequest) -> RequestDecision {
        println!("-> {:<11} {}", request.resource_type.as_str(), request.url);
        if request.resource_type == ResourceType::Image {
            self.aborted += 1;
            RequestDecision::Abort
        } else {
            self.continued += 1;
            RequestDecision::Continue
        }
    }

    fn wants_body(&self, response: &ResponseMeta) -> bool {
        response.status == 200 && response.resource_type == ResourceType::Stylesheet
    }

    fn on_response(&mut self, response: &ResponseMeta, body: &str) {
        self.stylesheets.push((response.url.clone(), body.len()));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://www.cbd.int/".to_string());

    let pool = BrowserPool::new(BrowserConfig::default());
    let mut page = pool.acquire_page().await?;
    page.set_request_interception(true).await?;

    let mut log = TrafficLog::default();
    let outcome = page.goto(&url, &NavigateOptions::default(), &mut log).await;

    match outcome {
        Ok(()) => {
            let html = page.content().await?;
            println!(
                "{} bytes of HTML, {} requests continued, {} aborted",
                html.len(),
                log.continued,
                log.aborted
            );
            for (sheet, size) in &log.stylesheets {
                println!("   stylesheet {} ({} bytes)", sheet, size);
            }
        }
        Err(e) => println!("Navigation failed: {}", e),
    }

    pool.release_page(page).await;
    Ok(())
}
