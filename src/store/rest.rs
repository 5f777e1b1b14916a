// ☁️ Hosted Vote Store - PostgREST-style table API
//
//   GET  /rest/v1/votes?select=...&order=id.asc&offset=N&limit=M
//   GET  /rest/v1/blacklist?select=venue_id
//   POST /rest/v1/votes?on_conflict=id      (Prefer: resolution=merge-duplicates)
//   POST /rest/v1/suggestions

use super::{BlacklistEntry, Report, VoteRecord, VoteStore};
use crate::error::DbError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use std::time::Duration;

const VOTE_COLUMNS: &str = "id,name,cash_votes,giro_votes,card_votes";

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DbError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RestStore {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Turn non-2xx answers into `DbError::Status` with a short body snippet.
async fn check(response: Response) -> Result<Response, DbError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DbError::Status {
        status: status.as_u16(),
        body: body.chars().take(256).collect(),
    })
}

#[async_trait]
impl VoteStore for RestStore {
    async fn fetch_votes_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<VoteRecord>, DbError> {
        let offset = offset.to_string();
        let limit = limit.to_string();

        let request = self.authed(self.client.get(self.table_url("votes"))).query(&[
            ("select", VOTE_COLUMNS),
            ("order", "id.asc"),
            ("offset", offset.as_str()),
            ("limit", limit.as_str()),
        ]);

        let response = check(request.send().await?).await?;
        Ok(response.json::<Vec<VoteRecord>>().await?)
    }

    async fn fetch_blacklist(&self) -> Result<Vec<BlacklistEntry>, DbError> {
        let request = self
            .authed(self.client.get(self.table_url("blacklist")))
            .query(&[("select", "venue_id")]);

        let response = check(request.send().await?).await?;
        Ok(response.json::<Vec<BlacklistEntry>>().await?)
    }

    async fn upsert_vote(&self, record: &VoteRecord) -> Result<(), DbError> {
        let request = self
            .authed(self.client.post(self.table_url("votes")))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[record]);

        check(request.send().await?).await?;
        Ok(())
    }

    async fn insert_report(&self, report: &Report) -> Result<(), DbError> {
        let request = self
            .authed(self.client.post(self.table_url("suggestions")))
            .header("Prefer", "return=minimal")
            .json(report);

        check(request.send().await?).await?;
        Ok(())
    }
}
