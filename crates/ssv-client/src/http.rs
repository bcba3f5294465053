//! Blocking HTTP data source.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ssv_core::{JobId, SpreadsheetId, join_ids};
use ssv_state::RowRef;

use crate::error::{ClientError, ClientResult};
use crate::source::{DataSource, SurvivalQuery};
use crate::wire::{IdRecord, Items, PValueRecord, RowRecord, ScoreRecord, SpreadsheetRecord};

/// Connection settings for the data server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_s: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v2".to_string(),
            timeout_s: 60,
            token: None,
            user_agent: None,
        }
    }
}

/// Data server client (blocking, no Tokio runtime required).
#[derive(Clone)]
pub struct HttpSource {
    http: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSource {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("ssv/{}", env!("CARGO_PKG_VERSION")));
        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_items<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<Vec<T>> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(%url, ?query, "GET");
        let mut req = self.http.get(&url).query(query);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Http(status.as_u16(), body));
        }

        let envelope: Items<T> = response
            .json()
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(envelope.items)
    }
}

impl DataSource for HttpSource {
    fn spreadsheet_ids_for_job(&self, job: JobId) -> ClientResult<Vec<SpreadsheetId>> {
        let records: Vec<IdRecord> =
            self.get_items("spreadsheets", &[("job_id", job.to_string())])?;
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    fn spreadsheets(&self, ids: &[SpreadsheetId]) -> ClientResult<Vec<SpreadsheetRecord>> {
        self.get_items("spreadsheets", &[("ids", join_ids(ids))])
    }

    fn variances(&self, ids: &[SpreadsheetId]) -> ClientResult<Vec<ScoreRecord>> {
        self.get_items(
            "spreadsheet_rows/variances",
            &[("spreadsheet_ids", join_ids(ids))],
        )
    }

    fn correlations(
        &self,
        ids: &[SpreadsheetId],
        group: RowRef,
    ) -> ClientResult<Vec<ScoreRecord>> {
        self.get_items(
            "spreadsheet_rows/correlations",
            &[
                ("spreadsheet_ids", join_ids(ids)),
                ("group_spreadsheet_id", group.spreadsheet_id.to_string()),
                ("group_row_idx", group.row_idx.to_string()),
            ],
        )
    }

    fn rows(&self, sheet: SpreadsheetId, indices: &[usize]) -> ClientResult<Vec<RowRecord>> {
        self.get_items(
            "spreadsheet_rows",
            &[
                ("spreadsheet_id", sheet.to_string()),
                ("row_idxs", join_ids(indices)),
            ],
        )
    }

    fn survival_pvalue(&self, query: &SurvivalQuery) -> ClientResult<f64> {
        let records: Vec<PValueRecord> = self.get_items(
            "survival_analyses",
            &[
                (
                    "duration_spreadsheet_id",
                    query.duration.spreadsheet_id.to_string(),
                ),
                ("duration_row_idx", query.duration.row_idx.to_string()),
                ("group_spreadsheet_id", query.group.spreadsheet_id.to_string()),
                ("group_row_idx", query.group.row_idx.to_string()),
                ("event_spreadsheet_id", query.event.spreadsheet_id.to_string()),
                ("event_row_idx", query.event.row_idx.to_string()),
                ("event_value", query.event_value.clone()),
            ],
        )?;
        match records.as_slice() {
            [PValueRecord { pvalue: Some(p) }] => Ok(*p),
            _ => Err(ClientError::Malformed(format!(
                "expected one p-value for {}, got {} record(s)",
                query.group,
                records.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let source = HttpSource::new(&ClientConfig {
            base_url: "http://example.test/api/".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(source.base_url(), "http://example.test/api");
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: ClientConfig = serde_yaml::from_str("timeout_s: 5").unwrap();
        assert_eq!(config.timeout_s, 5);
        assert_eq!(config.base_url, ClientConfig::default().base_url);
        assert!(config.token.is_none());
    }
}
