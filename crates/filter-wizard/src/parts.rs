//! Parts catalog search for a computed resistor value

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::PartsConfig;
use crate::error::{Result, WizardError};

const ENDPOINT: &str = "parts catalog";

/// One catalog hit, in the catalog's ranking order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartListing {
    pub supplier: String,
    pub part_number: String,
    /// First USD price break, when the part is offered in USD
    pub price_usd: Option<f64>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    item: CatalogPart,
}

#[derive(Deserialize)]
struct CatalogPart {
    brand: Option<Brand>,
    mpn: Option<String>,
    #[serde(default)]
    offers: Vec<Offer>,
}

#[derive(Deserialize)]
struct Brand {
    name: String,
}

#[derive(Deserialize)]
struct Offer {
    #[serde(default)]
    prices: HashMap<String, Vec<Vec<Value>>>,
}

impl CatalogPart {
    /// Price of the first USD tier, as `[quantity, price]`
    fn first_usd_price(&self) -> Option<f64> {
        self.offers
            .iter()
            .filter_map(|o| o.prices.get("USD"))
            .find_map(|tiers| tiers.first().and_then(|tier| tier.get(1)))
            .and_then(crate::json_f64)
    }
}

pub struct PartsClient {
    http: Client,
    url: String,
    api_key: String,
    limit: usize,
}

impl PartsClient {
    pub fn new(http: Client, config: &PartsConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            limit: config.limit,
        }
    }

    /// Up to `limit` resistors matching `resistance` rounded to the nearest ohm
    pub async fn search(&self, resistance: f64) -> Result<Vec<PartListing>> {
        let query = search_query(resistance)?;
        let limit = self.limit.to_string();
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("q", query.as_str()),
                ("start", "0"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| WizardError::remote(ENDPOINT, e))?
            .error_for_status()
            .map_err(|e| WizardError::remote(ENDPOINT, e))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| WizardError::unexpected(ENDPOINT, e.to_string()))?;

        let listings = parse_listings(&body, self.limit)?;
        info!("Catalog returned {} listings for {:?}", listings.len(), query);
        Ok(listings)
    }
}

/// Free-text catalog query for a resistance in ohms
pub fn search_query(resistance: f64) -> Result<String> {
    if !resistance.is_finite() || resistance < 0.5 {
        return Err(WizardError::invalid(
            "resistance",
            format!("{resistance} does not round to a positive number of ohms"),
        ));
    }
    Ok(format!("{} ohm resistor", resistance.round() as u64))
}

/// Map a catalog response into listings, keeping the catalog's order
pub fn parse_listings(body: &Value, limit: usize) -> Result<Vec<PartListing>> {
    let response = SearchResponse::deserialize(body)
        .map_err(|e| WizardError::unexpected(ENDPOINT, e.to_string()))?;

    let listings = response
        .results
        .into_iter()
        .filter_map(|result| {
            let price_usd = result.item.first_usd_price();
            match (result.item.brand, result.item.mpn) {
                (Some(brand), Some(mpn)) => Some(PartListing {
                    supplier: brand.name,
                    part_number: mpn,
                    price_usd,
                }),
                _ => {
                    debug!("Skipping catalog result without brand or part number");
                    None
                }
            }
        })
        .take(limit)
        .collect();
    Ok(listings)
}
