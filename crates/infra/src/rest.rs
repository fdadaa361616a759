//! PostgREST-style client for the hosted `expenses` table.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use spendwise_core::{ExpenseId, ExpenseRecord, ExpenseUpdate, OwnerId};

use crate::config::BackendConfig;
use crate::store::{ExpenseStore, ExpenseStoreError, sort_for_listing};

/// [`ExpenseStore`] backed by the hosted backend's REST table API.
///
/// Every request carries the `apikey` header and a bearer token; rows are
/// filtered with `column=eq.value` query parameters.
#[derive(Debug, Clone)]
pub struct RestExpenseStore {
    client: reqwest::Client,
    config: BackendConfig,
}

impl RestExpenseStore {
    pub fn new(config: BackendConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: BackendConfig) -> Self {
        Self { client, config }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url, self.config.expenses_table
        )
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer())
    }

    fn row_filter(owner_id: &OwnerId, id: &ExpenseId) -> [(&'static str, String); 2] {
        [
            ("id", format!("eq.{id}")),
            ("user_id", format!("eq.{owner_id}")),
        ]
    }

    async fn send_rows(
        &self,
        builder: RequestBuilder,
    ) -> Result<Vec<ExpenseRecord>, ExpenseStoreError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ExpenseStoreError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ExpenseStoreError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ExpenseStoreError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(ExpenseStoreError::Remote {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    serde_json::from_slice(&body).map_err(|e| ExpenseStoreError::Decode(e.to_string()))
}

#[async_trait]
impl ExpenseStore for RestExpenseStore {
    async fn fetch_all(&self, owner_id: &OwnerId) -> Result<Vec<ExpenseRecord>, ExpenseStoreError> {
        let mut rows = self
            .send_rows(self.request(Method::GET).query(&[
                ("user_id", format!("eq.{owner_id}")),
                ("order", "date.desc".to_string()),
            ]))
            .await?;

        sort_for_listing(&mut rows);
        debug!(owner_id = %owner_id, rows = rows.len(), "fetched expenses");
        Ok(rows)
    }

    async fn get(
        &self,
        owner_id: &OwnerId,
        id: &ExpenseId,
    ) -> Result<Option<ExpenseRecord>, ExpenseStoreError> {
        let rows = self
            .send_rows(
                self.request(Method::GET)
                    .query(&Self::row_filter(owner_id, id))
                    .query(&[("limit", "1")]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, record: ExpenseRecord) -> Result<ExpenseRecord, ExpenseStoreError> {
        record.validate()?;
        let id = record.id.clone();

        let response = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await
            .map_err(|e| ExpenseStoreError::Transport(e.to_string()))?;

        if response.status() == StatusCode::CONFLICT {
            return Err(ExpenseStoreError::AlreadyExists(id));
        }
        let rows: Vec<ExpenseRecord> = read_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ExpenseStoreError::Decode("insert returned no rows".to_string()))
    }

    async fn update(
        &self,
        owner_id: &OwnerId,
        id: &ExpenseId,
        update: ExpenseUpdate,
    ) -> Result<ExpenseRecord, ExpenseStoreError> {
        // Validate against the current row before sending the patch.
        let mut current = self
            .get(owner_id, id)
            .await?
            .ok_or_else(|| ExpenseStoreError::NotFound(id.clone()))?;
        current.apply(update.clone())?;

        let rows = self
            .send_rows(
                self.request(Method::PATCH)
                    .query(&Self::row_filter(owner_id, id))
                    .header("Prefer", "return=representation")
                    .json(&update),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ExpenseStoreError::NotFound(id.clone()))
    }

    async fn delete(&self, owner_id: &OwnerId, id: &ExpenseId) -> Result<(), ExpenseStoreError> {
        let rows = self
            .send_rows(
                self.request(Method::DELETE)
                    .query(&Self::row_filter(owner_id, id))
                    .header("Prefer", "return=representation"),
            )
            .await?;
        if rows.is_empty() {
            return Err(ExpenseStoreError::NotFound(id.clone()));
        }
        Ok(())
    }
}
