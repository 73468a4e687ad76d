//! Entity lookups backing tab-data resolution.
//!
//! [`ApiEntitySource`] fetches games, users and collections from the remote
//! API and keeps the last answer in the local `entities` table. Lookups are
//! lazy: the cached copy is served unless a fresh fetch is requested.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::database::connection::Database;
use crate::types::entities::{Collection, Game, User};
use crate::types::errors::FetchError;
use crate::types::settings::ApiSettings;

#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn game(&self, id: u64, fresh: bool) -> Result<Option<Game>, FetchError>;
    async fn user(&self, id: u64, fresh: bool) -> Result<Option<User>, FetchError>;
    async fn collection(&self, id: u64, fresh: bool) -> Result<Option<Collection>, FetchError>;
    /// Member games of a collection, always fetched from the source.
    async fn collection_games(&self, id: u64) -> Result<Vec<Game>, FetchError>;
}

pub struct ApiEntitySource {
    client: reqwest::Client,
    base_url: String,
    db: Arc<Database>,
}

impl ApiEntitySource {
    pub fn new(settings: &ApiSettings, db: Arc<Database>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            db,
        })
    }

    fn cached<T: DeserializeOwned>(&self, kind: &str, id: u64) -> Result<Option<T>, FetchError> {
        let conn = self.db.connection();
        let result = conn.query_row(
            "SELECT payload FROM entities WHERE kind = ?1 AND id = ?2",
            params![kind, id as i64],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| FetchError::Cache(e.to_string())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store<T: Serialize>(&self, kind: &str, id: u64, entity: &T) -> Result<(), FetchError> {
        let json = serde_json::to_string(entity).map_err(|e| FetchError::Cache(e.to_string()))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        self.db.connection().execute(
            "INSERT INTO entities (kind, id, payload, fetched_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(kind, id) DO UPDATE SET payload = excluded.payload, fetched_at = excluded.fetched_at",
            params![kind, id as i64, json, now],
        )?;
        Ok(())
    }

    async fn get_json(&self, path: &str) -> Result<Option<serde_json::Value>, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.json::<serde_json::Value>().await?;
        Ok(Some(body))
    }

    /// `GET /{kind}s/{id}` answering `{ "{kind}": {...} }`.
    async fn lazily<T>(&self, kind: &str, id: u64, fresh: bool) -> Result<Option<T>, FetchError>
    where
        T: DeserializeOwned + Serialize,
    {
        if !fresh {
            if let Some(entity) = self.cached::<T>(kind, id)? {
                return Ok(Some(entity));
            }
        }

        let Some(mut body) = self.get_json(&format!("{}s/{}", kind, id)).await? else {
            return Ok(None);
        };
        let value = match body.get_mut(kind).map(serde_json::Value::take) {
            Some(value) if !value.is_null() => value,
            _ => return Ok(None),
        };
        let entity: T = serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))?;
        self.store(kind, id, &entity)?;
        debug!(kind, id, fresh, "entity fetched");
        Ok(Some(entity))
    }
}

#[async_trait]
impl EntitySource for ApiEntitySource {
    async fn game(&self, id: u64, fresh: bool) -> Result<Option<Game>, FetchError> {
        self.lazily("game", id, fresh).await
    }

    async fn user(&self, id: u64, fresh: bool) -> Result<Option<User>, FetchError> {
        self.lazily("user", id, fresh).await
    }

    async fn collection(&self, id: u64, fresh: bool) -> Result<Option<Collection>, FetchError> {
        self.lazily("collection", id, fresh).await
    }

    async fn collection_games(&self, id: u64) -> Result<Vec<Game>, FetchError> {
        let Some(mut body) = self.get_json(&format!("collections/{}/games", id)).await? else {
            return Ok(Vec::new());
        };
        match body.get_mut("games").map(serde_json::Value::take) {
            Some(games) if !games.is_null() => {
                serde_json::from_value(games).map_err(|e| FetchError::Decode(e.to_string()))
            }
            _ => Ok(Vec::new()),
        }
    }
}
