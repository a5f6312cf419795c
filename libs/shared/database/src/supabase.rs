use std::time::Duration;

use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Postgres `unique_violation`, surfaced by PostgREST in the error body.
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Data store unavailable: {0}")]
    Unavailable(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Data store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Data store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode data store response: {0}")]
    Decode(String),
}

impl DatabaseError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DatabaseError::Unavailable(_))
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        if body.contains(UNIQUE_VIOLATION_CODE) {
            return DatabaseError::UniqueViolation(body);
        }

        match status.as_u16() {
            409 => DatabaseError::UniqueViolation(body),
            401 | 403 => DatabaseError::Unauthorized(body),
            404 => DatabaseError::NotFound(body),
            502 | 503 | 504 => DatabaseError::Unavailable(body),
            code => DatabaseError::Api { status: code, message: body },
        }
    }
}

impl From<reqwest::Error> for DatabaseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            DatabaseError::Unavailable(e.to_string())
        } else if e.is_decode() {
            DatabaseError::Decode(e.to_string())
        } else {
            DatabaseError::Api {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

/// Thin PostgREST client. Filters are passed as `(column, "op.value")` pairs,
/// so a column may appear more than once (e.g. a `gte`/`lte` range).
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout ({}), using defaults", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&'static str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|_| DatabaseError::Unauthorized("Service key is not a valid header value".to_string()))?;
        headers.insert("apikey", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|_| DatabaseError::Unauthorized("Service key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_static(prefer));
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        filters: &[(String, String)],
        body: Option<Value>,
        prefer: Option<&'static str>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {} with {} filters", method, url, filters.len());

        let headers = self.get_headers(prefer)?;

        let mut req = self.client.request(method, &url)
            .headers(headers)
            .query(filters);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Data store error ({}): {}", status, error_text);
            return Err(DatabaseError::from_status(status, error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// `GET /rest/v1/{table}` with filters.
    pub async fn select<T>(&self, table: &str, filters: &[(String, String)]) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, &Self::table_path(table), filters, None, None).await
    }

    /// Insert one row and return its stored representation.
    pub async fn insert<T>(&self, table: &str, row: Value) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self
            .request(
                Method::POST,
                &Self::table_path(table),
                &[],
                Some(row),
                Some("return=representation"),
            )
            .await?;

        rows.pop()
            .ok_or_else(|| DatabaseError::Decode(format!("Insert into {} returned no rows", table)))
    }

    /// `PATCH` every row matching `filters`; returns the updated rows.
    /// An empty result means nothing matched, which callers use for
    /// compare-and-set style updates.
    pub async fn update<T>(
        &self,
        table: &str,
        filters: &[(String, String)],
        changes: Value,
    ) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request(
            Method::PATCH,
            &Self::table_path(table),
            filters,
            Some(changes),
            Some("return=representation"),
        )
        .await
    }

    fn table_path(table: &str) -> String {
        format!("/rest/v1/{}", table)
    }
}

/// Builds an `eq.` filter pair.
pub fn eq(column: &str, value: impl std::fmt::Display) -> (String, String) {
    (column.to_string(), format!("eq.{}", value))
}

/// Builds an `in.(a,b)` filter pair.
pub fn in_list<I, V>(column: &str, values: I) -> (String, String)
where
    I: IntoIterator<Item = V>,
    V: std::fmt::Display,
{
    let joined = values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    (column.to_string(), format!("in.({})", joined))
}
