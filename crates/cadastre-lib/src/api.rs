//! REST client for the cadastre backend
//!
//! A single generic [`ApiClient::call`] wraps authentication, query encoding and
//! error-body handling. The endpoint helpers on top of it fetch the tile server
//! capabilities and parcel attributes. Requests are never retried.

use crate::capabilities::CapabilitiesDocument;
use crate::feature_id::FeatureId;
use crate::mvt::{DecodedFeature, decode_tile};
use crate::parcel::Parcel;
use crate::tiles::{TileCoord, expand_tile_url};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

const TEGOLA_ROUTE_URL: &str = "tegola";
const PARCELS_ROUTE_URL: &str = "dkp/parcels";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Error body sent by the backend on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    error: Option<String>,
    #[serde(default, rename = "statusCode")]
    #[allow(dead_code)]
    status_code: Option<u16>,
}

impl ApiError {
    /// Build the error for a non-2xx response from its status and raw body
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ApiErrorResponse>(body)
            .map(|body| body.message)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        Self::Status {
            status: status.as_u16(),
            message,
        }
    }
}

/// One call against the backend
#[derive(Clone, Debug)]
pub struct ApiRequest {
    endpoint: String,
    method: Method,
    query_params: Vec<(String, String)>,
    payload: Option<Value>,
    override_auth_token: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            query_params: Vec::new(),
            payload: None,
            override_auth_token: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query_params.push((key.into(), value.to_string()));
        self
    }

    /// JSON body sent with the request
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Use this token instead of the client's own
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.override_auth_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// Capabilities of the vector tile server
pub fn capabilities_request() -> ApiRequest {
    ApiRequest::get(format!("/{TEGOLA_ROUTE_URL}/tegola-capabilities"))
}

/// Attributes of one parcel
pub fn parcel_request(parcel_id: &FeatureId) -> ApiRequest {
    ApiRequest::get(format!("/{PARCELS_ROUTE_URL}/{parcel_id}/"))
}

/// Authenticated JSON client bound to one API base URL
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.filter(|token| !token.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of a request. The query string is replaced by the request parameters.
    pub fn request_url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, request.endpoint);
        let mut url = Url::parse(&raw).map_err(|err| ApiError::InvalidUrl {
            url: raw.clone(),
            reason: err.to_string(),
        })?;

        url.set_query(None);
        if !request.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query_params);
        }
        Ok(url)
    }

    fn bearer_token<'a>(&'a self, request: &'a ApiRequest) -> Option<&'a str> {
        request
            .override_auth_token
            .as_deref()
            .or(self.access_token.as_deref())
            .filter(|token| !token.is_empty())
    }

    /// Perform a request and return its JSON body, `None` for `204 No Content`
    pub async fn call(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        let url = self.request_url(&request)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.bearer_token(&request) {
            builder = builder.bearer_auth(token);
        }
        if let Some(payload) = &request.payload {
            builder = builder.body(payload.to_string());
        }
        #[cfg(target_arch = "wasm32")]
        {
            builder = builder.fetch_credentials_include();
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let err = ApiError::from_response(status, &body);
            tracing::warn!("{} {} failed: {}", request.method, request.endpoint, err);
            return Err(err);
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// `GET /tegola/tegola-capabilities`
    pub async fn fetch_capabilities(&self) -> Result<CapabilitiesDocument, ApiError> {
        let body = self.call(capabilities_request()).await?;
        Ok(body.map(CapabilitiesDocument::from_value).unwrap_or_default())
    }

    /// `GET /dkp/parcels/{id}/`
    pub async fn fetch_parcel(&self, parcel_id: &FeatureId) -> Result<Option<Parcel>, ApiError> {
        match self.call(parcel_request(parcel_id)).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Fetch a binary resource such as a vector tile. No authentication is sent.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/x-protobuf,application/octet-stream")
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::from_response(status, &body));
        }
        Ok(body.to_vec())
    }

    /// Fetch and decode one vector tile of a layer URL template
    pub async fn fetch_vector_tile(
        &self,
        template: &str,
        tile: TileCoord,
    ) -> crate::Result<Vec<DecodedFeature>> {
        let bytes = self.fetch_bytes(&expand_tile_url(template, tile)).await?;
        Ok(decode_tile(&bytes, tile)?)
    }
}
