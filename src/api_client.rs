// Client for the remote catalog search API
use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

pub async fn search_products(api_url: &str, keyword: &str, max_pages: u32) -> Result<Vec<Product>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(35))
        .build()?;
    let url = format!(
        "{}/api/search?keyword={}&maxPages={}",
        api_url,
        urlencoding::encode(keyword),
        max_pages
    );
    let res = client.get(url).send().await?;

    let res = res.error_for_status()?;
    let products = res.json::<Vec<Product>>().await?;
    Ok(products)
}
