//! Manual scrape runner against the live site
//!
//! Usage: `scrape_demo [keyword] [pages]` — defaults to one page of 冰箱.
//! Log verbosity follows `RUST_LOG`.

use anyhow::Result;
use jd_scout::Scraper;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let keyword = std::env::args().nth(1).unwrap_or_else(|| "冰箱".to_string());
    let max_pages = std::env::args()
        .nth(2)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);

    println!("Scraping JD for '{keyword}' ({max_pages} page(s))");

    let mut stream = Scraper::from_keyword(&keyword, max_pages)?.scrape();
    let mut count = 0usize;
    while let Some(product) = stream.next().await {
        count += 1;
        println!(
            "[{count}] {} | brand={} model={} shop={} | {}",
            product.title,
            product.brand.as_deref().unwrap_or("-"),
            product.model.as_deref().unwrap_or("-"),
            product.shop.as_deref().unwrap_or("-"),
            product.detail_url,
        );
    }

    println!("Done: {count} product(s) resolved");
    Ok(())
}
