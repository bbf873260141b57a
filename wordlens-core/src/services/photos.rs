//! Photo search client (Unsplash-style API).
//!
//! Searches are GET requests, side-effect-free, and cached by the pipeline.

use std::sync::Arc;

use serde_json::Value;

use wordlens_commons::ApiError;

use crate::config::constants::{env_vars, services, urls};
use crate::config::PipelineConfig;
use crate::pipeline::{ApiOperation, RequestPipeline};
use crate::services::{resolve_api_key, resolve_base_url};
use crate::transport::{HttpTransport, Transport};

const SERVICE_NAME: &str = "photos";

/// One photo from a search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    pub description: Option<String>,
    pub regular_url: String,
    pub thumb_url: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSearchResult {
    pub total: u64,
    pub total_pages: u64,
    pub results: Vec<Photo>,
}

pub struct PhotoSearchClient {
    access_key: String,
    base_url: String,
    pipeline: RequestPipeline,
}

impl PhotoSearchClient {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self::from_config(Some(access_key.into()), None, None)
    }

    pub fn from_config(
        access_key: Option<String>,
        base_url: Option<String>,
        config: Option<PipelineConfig>,
    ) -> Self {
        Self::with_transport(
            access_key,
            base_url,
            Arc::new(HttpTransport::new()),
            config,
        )
    }

    pub fn with_transport(
        access_key: Option<String>,
        base_url: Option<String>,
        transport: Arc<dyn Transport>,
        config: Option<PipelineConfig>,
    ) -> Self {
        let access_key =
            resolve_api_key(access_key, env_vars::PHOTO_ACCESS_KEY).unwrap_or_default();
        let base_url = resolve_base_url(urls::PHOTO_API_BASE, base_url, env_vars::PHOTO_BASE_URL);
        let config = config.unwrap_or_default();
        Self {
            access_key,
            base_url,
            pipeline: RequestPipeline::new(SERVICE_NAME, transport, &config),
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Search photos matching `query`. Pages are 1-based.
    pub async fn search_photos(
        &self,
        query: &str,
        page: u32,
    ) -> Result<PhotoSearchResult, ApiError> {
        let operation = ApiOperation::get(format!("{}/search/photos", self.base_url))
            .query("query", query)
            .query("page", page.max(1))
            .query("per_page", services::PHOTOS_PER_PAGE)
            .header(
                "Authorization",
                format!("Client-ID {}", self.access_key),
            )
            .header("Accept-Version", services::PHOTOS_API_VERSION)
            .cacheable(true);

        let response = self.pipeline.execute(operation).await?;
        parse_search_response(&response.json()?)
    }

    /// Fetch a single photo by id.
    pub async fn get_photo(&self, id: &str) -> Result<Photo, ApiError> {
        let operation = ApiOperation::get(format!("{}/photos/{}", self.base_url, id))
            .header(
                "Authorization",
                format!("Client-ID {}", self.access_key),
            )
            .header("Accept-Version", services::PHOTOS_API_VERSION)
            .cacheable(true);

        let response = self.pipeline.execute(operation).await?;
        parse_photo(&response.json()?).ok_or_else(|| ApiError::Decode {
            message: "photo payload missing required fields".to_owned(),
            metadata: None,
        })
    }
}

fn parse_search_response(value: &Value) -> Result<PhotoSearchResult, ApiError> {
    let results = value
        .get("results")
        .and_then(|results| results.as_array())
        .ok_or_else(|| ApiError::Decode {
            message: "search payload missing 'results'".to_owned(),
            metadata: None,
        })?;

    Ok(PhotoSearchResult {
        total: value.get("total").and_then(Value::as_u64).unwrap_or(0),
        total_pages: value
            .get("total_pages")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        results: results.iter().filter_map(parse_photo).collect(),
    })
}

fn parse_photo(value: &Value) -> Option<Photo> {
    let id = value.get("id")?.as_str()?.to_owned();
    let regular_url = value
        .get("urls")
        .and_then(|urls| urls.get("regular"))
        .and_then(Value::as_str)?
        .to_owned();

    Some(Photo {
        id,
        description: value
            .get("description")
            .and_then(Value::as_str)
            .or_else(|| value.get("alt_description").and_then(Value::as_str))
            .map(str::to_owned),
        regular_url,
        thumb_url: value
            .get("urls")
            .and_then(|urls| urls.get("thumb"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        width: value.get("width").and_then(Value::as_u64),
        height: value.get("height").and_then(Value::as_u64),
    })
}
