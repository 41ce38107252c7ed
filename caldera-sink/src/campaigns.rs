//! Read-only access to Caldera campaign metadata
//!
//! Campaign lookups are independent of the batching path: they never queue
//! anything and they work the same regardless of the sink's `send` toggle.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::build_http_client;

/// One campaign as returned by GET /campaigns/list
#[derive(Debug, Clone, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    /// Whether the campaign is API-triggered
    #[serde(default, rename = "is_api_campaign")]
    pub is_api: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Campaign properties from GET /campaigns/details
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub schedule_type: Option<String>,
}

/// Response from GET /campaigns/list
#[derive(Debug, Deserialize)]
struct CampaignListResponse {
    #[serde(default)]
    campaigns: Vec<Campaign>,
}

/// Response from GET /campaigns/data_series
#[derive(Debug, Deserialize)]
struct DataSeriesResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Client for the campaign metadata endpoints
pub struct CampaignsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CampaignsClient {
    /// Create a campaigns client from the sink configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            http_client: build_http_client(config)?,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the campaign list.
    pub async fn list(&self, include_archived: bool, descending: bool) -> Result<Vec<Campaign>> {
        let url = format!("{}/campaigns/list", self.base_url);

        let mut query: Vec<(&str, &str)> = Vec::new();
        if include_archived {
            query.push(("include_archived", "true"));
        }
        if descending {
            query.push(("sort_order", "desc"));
        }

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: CampaignListResponse = response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))?;
            Ok(result.campaigns)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Fetch details for one campaign.
    pub async fn details(&self, campaign_id: &str) -> Result<CampaignDetails> {
        let url = format!("{}/campaigns/details", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("campaign_id", campaign_id)])
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Fetch a campaign's analytics data series.
    ///
    /// `length` is the number of days to fetch, ending at `ending_at` (now,
    /// when omitted). Data points are returned as raw JSON since their shape
    /// varies by campaign type.
    pub async fn data_series(
        &self,
        campaign_id: &str,
        length: u32,
        ending_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/campaigns/data_series", self.base_url);

        let length = length.to_string();
        let mut query: Vec<(&str, String)> = vec![
            ("campaign_id", campaign_id.to_string()),
            ("length", length),
        ];
        if let Some(ending_at) = ending_at {
            query.push(("ending_at", ending_at.to_rfc3339()));
        }

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: DataSeriesResponse = response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))?;
            Ok(result.data)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
