//! HTTP remote tier
//!
//! Talks to ibsync-server:
//! - grid: `GET/PUT /api/toewijzingen/grid` (one assignment date per client)
//! - registry: `GET/PUT /api/residents`

use super::remote::{RemoteSnapshot, RemoteStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use ibsync_common::api::{
    BatchOutcome, GridResponse, ResidentsResponse, SaveGridRequest, SaveGridResponse,
};
use ibsync_common::models::DEFAULT_RESIDENT_ROWS;
use ibsync_common::{Error, Grid, Resident, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = concat!("ibsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Remote store client for one assignment date
#[derive(Debug, Clone)]
pub struct HttpRemote {
    http_client: reqwest::Client,
    base_url: String,
    date: NaiveDate,
}

impl HttpRemote {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:5740`)
    pub fn new(base_url: impl Into<String>, date: NaiveDate) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            date,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_text
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("Malformed response: {}", e)))
    }
}

fn network(e: reqwest::Error) -> Error {
    Error::RemoteUnavailable(e.to_string())
}

#[async_trait]
impl RemoteStore<Grid> for HttpRemote {
    async fn load(&self) -> Result<Option<RemoteSnapshot<Grid>>> {
        let url = self.url("/api/toewijzingen/grid");
        tracing::debug!(url = %url, date = %self.date, "Loading grid from remote");

        let response = self
            .http_client
            .get(&url)
            .query(&[("date", self.date.to_string())])
            .send()
            .await
            .map_err(network)?;
        let body: GridResponse = Self::read_json(response).await?;

        // Staff headers are shared across dates; they alone do not make a saved grid
        if body.grid_cells.is_empty() && body.saved_at.is_none() {
            return Ok(None);
        }

        Ok(Some(RemoteSnapshot {
            payload: Grid::from_records(&body.grid_cells, &body.staff_records, DEFAULT_RESIDENT_ROWS),
            saved_at: body.saved_at,
        }))
    }

    async fn save(&self, grid: &Grid) -> Result<BatchOutcome> {
        let request = SaveGridRequest {
            date: self.date,
            cells: grid.to_records(self.date),
            staff_names: grid.staff.iter().map(|s| s.name.clone()).collect(),
        };
        tracing::debug!(
            date = %self.date,
            cells = request.cells.len(),
            staff = request.staff_names.len(),
            "Saving grid to remote"
        );

        let response = self
            .http_client
            .put(self.url("/api/toewijzingen/grid"))
            .json(&request)
            .send()
            .await
            .map_err(network)?;
        let outcome: SaveGridResponse = Self::read_json(response).await?;
        Ok(outcome.grid.merge(outcome.staff))
    }
}

#[async_trait]
impl RemoteStore<Vec<Resident>> for HttpRemote {
    async fn load(&self) -> Result<Option<RemoteSnapshot<Vec<Resident>>>> {
        let response = self
            .http_client
            .get(self.url("/api/residents"))
            .send()
            .await
            .map_err(network)?;
        let body: ResidentsResponse = Self::read_json(response).await?;

        if body.residents.is_empty() && body.saved_at.is_none() {
            return Ok(None);
        }
        Ok(Some(RemoteSnapshot {
            payload: body.residents,
            saved_at: body.saved_at,
        }))
    }

    async fn save(&self, residents: &Vec<Resident>) -> Result<BatchOutcome> {
        tracing::debug!(count = residents.len(), "Saving registry to remote");
        let response = self
            .http_client
            .put(self.url("/api/residents"))
            .json(residents)
            .send()
            .await
            .map_err(network)?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let remote = HttpRemote::new("http://127.0.0.1:5740/", date).unwrap();
        assert_eq!(remote.url("/api/residents"), "http://127.0.0.1:5740/api/residents");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_remote_unavailable() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        // Port 9 (discard) is closed on test hosts
        let remote = HttpRemote::new("http://127.0.0.1:9", date).unwrap();
        let result = RemoteStore::<Grid>::load(&remote).await;
        assert!(matches!(result, Err(Error::RemoteUnavailable(_))));
    }
}
