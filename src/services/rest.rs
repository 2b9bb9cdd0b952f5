//! REST client for the hosted timer history table

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::RepositoryError;
use super::history::{TimerHistoryRepository, TimerRecord};

const TIMERS_TABLE: &str = "timers";

/// Talks to a PostgREST-style endpoint exposing the `timers` table.
#[derive(Debug, Clone)]
pub struct RestTimerHistoryRepository {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RestTimerHistoryRepository {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, RepositoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RepositoryError::Network(format!("invalid backend url '{base_url}': {e}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn table_url(&self) -> Result<Url, RepositoryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RepositoryError::Network("backend url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(TIMERS_TABLE);
        Ok(url)
    }

    fn user_url(&self, uid: &str, extra: &[(&str, &str)]) -> Result<Url, RepositoryError> {
        let mut url = self.table_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uid", &format!("eq.{uid}"));
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl TimerHistoryRepository for RestTimerHistoryRepository {
    async fn get_timer(&self, uid: &str) -> Result<TimerRecord, RepositoryError> {
        let url = self.user_url(uid, &[("limit", "1")])?;
        debug!("GET {}", url);

        let response = ensure_success(self.request(Method::GET, url).send().await?, uid).await?;
        let rows: Vec<TimerRecord> = response.json().await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(uid.to_string()))
    }

    async fn upsert_timer(&self, record: &TimerRecord) -> Result<TimerRecord, RepositoryError> {
        let url = self.table_url()?;
        debug!("POST {} uid={}", url, record.uid);

        let response = self
            .request(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[record])
            .send()
            .await?;
        let response = ensure_success(response, &record.uid).await?;

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(record.clone());
        }
        let rows: Vec<TimerRecord> =
            serde_json::from_str(&body).map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(rows.into_iter().next().unwrap_or_else(|| record.clone()))
    }

    async fn get_timers_of_user(&self, uid: &str) -> Result<Vec<TimerRecord>, RepositoryError> {
        let url = self.user_url(uid, &[("order", "updatedAt.desc")])?;
        debug!("GET {}", url);

        let response = ensure_success(self.request(Method::GET, url).send().await?, uid).await?;
        Ok(response.json().await?)
    }

    async fn delete_timer(&self, uid: &str) -> Result<(), RepositoryError> {
        let url = self.user_url(uid, &[])?;
        debug!("DELETE {}", url);

        ensure_success(self.request(Method::DELETE, url).send().await?, uid).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response, uid: &str) -> Result<Response, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RepositoryError::Auth(http_error_message(status, &body))
        }
        StatusCode::NOT_FOUND => RepositoryError::NotFound(uid.to_string()),
        _ => RepositoryError::Network(http_error_message(status, &body)),
    })
}

fn http_error_message(status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        format!("timer backend error: http {}", status.as_u16())
    } else {
        format!("timer backend error: http {}; body={}", status.as_u16(), body.trim())
    }
}
