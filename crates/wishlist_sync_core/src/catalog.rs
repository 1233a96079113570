use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::SyncConfig;

const LOG_BODY_LIMIT: usize = 50;

/// A wish list as it currently exists on the remote account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteList {
    #[serde(rename = "wishlist_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColorRecord {
    pub name: String,
}

/// Identifier scheme used when looking up catalog object ids for a part code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdScheme {
    Ldraw,
    Design,
    Any,
}

impl IdScheme {
    /// Lookup order: LDraw ids track other catalogs most closely, then design ids,
    /// then an unscoped match.
    pub const PRIORITY: [IdScheme; 3] = [IdScheme::Ldraw, IdScheme::Design, IdScheme::Any];

    pub fn id_type(self) -> Option<&'static str> {
        match self {
            Self::Ldraw => Some("ldraw"),
            Self::Design => Some("design_id"),
            Self::Any => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ldraw => "ldraw",
            Self::Design => "design",
            Self::Any => "any",
        }
    }
}

pub trait CatalogApi {
    fn list_wishlists(&mut self) -> Result<Vec<RemoteList>>;
    fn create_wishlist(&mut self, name: &str, description: &str) -> Result<String>;
    fn delete_wishlist(&mut self, list_id: &str) -> Result<()>;
    fn create_lot(&mut self, object_id: &str, color_id: &str, list_id: &str) -> Result<String>;
    fn update_lot_quantity(
        &mut self,
        list_id: &str,
        lot_id: &str,
        minimum_quantity: u32,
    ) -> Result<()>;
    fn color_catalog(&mut self) -> Result<BTreeMap<String, ColorRecord>>;
    fn lookup_object_ids(&mut self, code: &str, scheme: IdScheme) -> Result<Vec<String>>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl CatalogClientConfig {
    pub fn from_config(config: &SyncConfig, api_key: &str) -> Self {
        let lookup = |key: &str| std::env::var(key).ok();
        Self {
            api_url: config.api_url(lookup),
            api_key: api_key.to_string(),
            user_agent: config.user_agent(lookup),
            timeout_ms: config.timeout_ms(lookup),
        }
    }
}

pub struct BrickOwlClient {
    client: Client,
    config: CatalogClientConfig,
    request_count: usize,
}

impl BrickOwlClient {
    pub fn new(config: CatalogClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            bail!("an API key is required to call the catalog service");
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build catalog HTTP client")?;

        Ok(Self {
            client,
            config,
            request_count: 0,
        })
    }

    fn request_get(
        &mut self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(StatusCode, String)> {
        let url = build_get_url(&self.config.api_url, path, query, &self.config.api_key)?;
        debug!(method = "GET", path, "catalog request");
        self.request_count += 1;

        let response = self
            .client
            .get(url)
            .header("User-Agent", self.config.user_agent.clone())
            .header("Content-Type", "application/json")
            .send()
            .with_context(|| format!("failed to call catalog API GET {path}"))?;
        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("failed to read response body for GET {path}"))?;
        debug!(
            method = "GET",
            path,
            status = status.as_u16(),
            body = %ellipsis(&body),
            "catalog response"
        );
        Ok((status, body))
    }

    fn get_json<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let (status, body) = self.request_get(path, query)?;
        if !status.is_success() {
            bail!("{}", describe_failure("GET", path, status, &body));
        }
        serde_json::from_str(&body)
            .with_context(|| format!("failed to decode catalog API JSON response for GET {path}"))
    }

    fn post_form(&mut self, path: &str, fields: &[(&str, String)]) -> Result<String> {
        let url = format!("{}/{}", self.config.api_url, path);
        let pairs = build_form_pairs(fields, &self.config.api_key);

        debug!(method = "POST", path, params = %redacted_fields(&pairs), "catalog request");
        self.request_count += 1;

        let response = self
            .client
            .post(url.as_str())
            .header("User-Agent", self.config.user_agent.clone())
            .form(&pairs)
            .send()
            .with_context(|| format!("failed to call catalog API POST {path}"))?;
        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("failed to read response body for POST {path}"))?;
        debug!(
            method = "POST",
            path,
            status = status.as_u16(),
            body = %ellipsis(&body),
            "catalog response"
        );

        check_post_status(path, status, &body)?;
        Ok(body)
    }

    fn post_json<T: DeserializeOwned>(
        &mut self,
        path: &str,
        fields: &[(&str, String)],
    ) -> Result<T> {
        let body = self.post_form(path, fields)?;
        serde_json::from_str(&body)
            .with_context(|| format!("failed to decode catalog API JSON response for POST {path}"))
    }
}

impl CatalogApi for BrickOwlClient {
    fn list_wishlists(&mut self) -> Result<Vec<RemoteList>> {
        self.get_json("wishlist/lists", &[])
    }

    fn create_wishlist(&mut self, name: &str, description: &str) -> Result<String> {
        let response: CreateListResponse = self.post_json(
            "wishlist/create_list",
            &[
                ("name", name.to_string()),
                ("description", description.to_string()),
            ],
        )?;
        Ok(response.wishlist_id)
    }

    fn delete_wishlist(&mut self, list_id: &str) -> Result<()> {
        self.post_form("wishlist/delete_list", &[("wishlist_id", list_id.to_string())])?;
        Ok(())
    }

    fn create_lot(&mut self, object_id: &str, color_id: &str, list_id: &str) -> Result<String> {
        let response: CreateLotResponse = self.post_json(
            "wishlist/create_lot",
            &[
                ("boid", object_id.to_string()),
                ("color_id", color_id.to_string()),
                ("wishlist_id", list_id.to_string()),
            ],
        )?;
        Ok(response.lot_id)
    }

    fn update_lot_quantity(
        &mut self,
        list_id: &str,
        lot_id: &str,
        minimum_quantity: u32,
    ) -> Result<()> {
        self.post_form(
            "wishlist/update",
            &[
                ("minimum_quantity", minimum_quantity.to_string()),
                ("wishlist_id", list_id.to_string()),
                ("lot_id", lot_id.to_string()),
            ],
        )?;
        Ok(())
    }

    fn color_catalog(&mut self) -> Result<BTreeMap<String, ColorRecord>> {
        self.get_json("catalog/color_list", &[])
    }

    fn lookup_object_ids(&mut self, code: &str, scheme: IdScheme) -> Result<Vec<String>> {
        let mut query = vec![("id", code.to_string()), ("type", "Part".to_string())];
        if let Some(id_type) = scheme.id_type() {
            query.push(("id_type", id_type.to_string()));
        }

        let path = "catalog/id_lookup";
        let (status, body) = self.request_get(path, &query)?;
        parse_lookup_response(path, status, &body)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

pub fn build_get_url(
    api_url: &str,
    path: &str,
    query: &[(&str, String)],
    api_key: &str,
) -> Result<Url> {
    let base = format!("{}/{}", api_url.trim_end_matches('/'), path);
    let pairs = query
        .iter()
        .map(|(key, value)| (*key, value.as_str()))
        .chain(std::iter::once(("key", api_key)));
    Url::parse_with_params(&base, pairs).with_context(|| format!("invalid catalog API URL: {base}"))
}

/// Form fields for a mutating call. Empty values are left out and the API key
/// is always appended.
pub fn build_form_pairs(fields: &[(&str, String)], api_key: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(fields.len() + 1);
    for (key, value) in fields {
        if !value.is_empty() {
            pairs.push(((*key).to_string(), value.clone()));
        }
    }
    pairs.push(("key".to_string(), api_key.to_string()));
    pairs
}

/// Mutating calls succeed on HTTP 200 only.
pub fn check_post_status(path: &str, status: StatusCode, body: &str) -> Result<()> {
    if status != StatusCode::OK {
        bail!("{}", describe_failure("POST", path, status, body));
    }
    Ok(())
}

/// Candidate object ids from an id lookup. The service answers unmatched codes
/// with a non-2xx error envelope, which counts as no candidates; any other
/// non-2xx response is an error.
pub fn parse_lookup_response(path: &str, status: StatusCode, body: &str) -> Result<Vec<String>> {
    if !status.is_success() {
        if parse_error_status(body).is_some() {
            return Ok(Vec::new());
        }
        bail!("{}", describe_failure("GET", path, status, body));
    }
    let parsed: IdLookupResponse =
        serde_json::from_str(body).context("failed to decode id lookup API response")?;
    Ok(parsed.boids.unwrap_or_default())
}

/// Human-readable message for a failed call, preferring the service's own
/// `{"error":{"status":...}}` text over the bare HTTP status.
pub fn describe_failure(method: &str, path: &str, status: StatusCode, body: &str) -> String {
    match parse_error_status(body) {
        Some(message) => format!("catalog API {method} {path} failed ({status}): {message}"),
        None => format!("catalog API {method} {path} failed with HTTP {status}"),
    }
}

fn parse_error_status(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.status)
}

pub fn ellipsis(body: &str) -> String {
    if body.chars().count() < LOG_BODY_LIMIT {
        return body.to_string();
    }
    let truncated: String = body.chars().take(LOG_BODY_LIMIT).collect();
    format!("{truncated}...")
}

fn redacted_fields(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| {
            if key == "key" {
                format!("{key}=***")
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    status: String,
}

#[derive(Debug, Deserialize)]
struct CreateListResponse {
    wishlist_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateLotResponse {
    lot_id: String,
}

#[derive(Debug, Deserialize)]
struct IdLookupResponse {
    #[serde(default)]
    boids: Option<Vec<String>>,
}
