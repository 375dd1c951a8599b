//! Hosted REST gateway
//!
//! Talks to a PostgREST-style backend: tables live under `/rest/v1/<table>`,
//! rows are selected with `column=eq.value` filters and writes echo the
//! stored rows back when asked with `Prefer: return=representation`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::PersistenceGateway;
use crate::error::{Error, Result};
use crate::models::{Category, NewTransaction, Transaction, TransactionUpdate};

#[derive(Serialize)]
struct TransactionRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    tx: &'a NewTransaction,
}

#[derive(Serialize)]
struct CategoryRow<'a> {
    user_id: &'a str,
    name: &'a str,
}

/// REST client for a hosted database
#[derive(Clone)]
pub struct RestGateway {
    http_client: Client,
    base_url: String,
    api_key: String,
    /// Session token of the signed-in user; the API key is sent when absent
    access_token: Option<String>,
}

impl RestGateway {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, table: &str, query: &[(&str, String)]) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        debug!(%method, %url, "REST request");
        self.http_client
            .request(method, url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    /// Turn a non-success status into a gateway error carrying the response body
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Gateway(format!("{}: {}", status, body.trim())))
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn single<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(what.to_string()))
    }

    fn owned_row(owner: &str, id: i64) -> Vec<(&'static str, String)> {
        vec![("id", format!("eq.{}", id)), ("user_id", format!("eq.{}", owner))]
    }
}

#[async_trait]
impl PersistenceGateway for RestGateway {
    async fn fetch_transactions(&self, owner: &str) -> Result<Vec<Transaction>> {
        let response = self
            .request(
                Method::GET,
                "transactions",
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{}", owner)),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn fetch_categories(&self, owner: &str) -> Result<Vec<Category>> {
        let response = self
            .request(
                Method::GET,
                "categories",
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{}", owner)),
                ],
            )
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn insert_transaction(&self, owner: &str, tx: &NewTransaction) -> Result<Transaction> {
        let response = self
            .request(Method::POST, "transactions", &[])
            .header("Prefer", "return=representation")
            .json(&[TransactionRow { user_id: owner, tx }])
            .send()
            .await?;
        Self::single(response, "inserted transaction")
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::Gateway("Insert returned no row".into()),
                other => other,
            })
    }

    async fn update_transaction(
        &self,
        owner: &str,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<Transaction> {
        let response = self
            .request(Method::PATCH, "transactions", &Self::owned_row(owner, id))
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;
        Self::single(response, &format!("Transaction {}", id)).await
    }

    async fn delete_transaction(&self, owner: &str, id: i64) -> Result<()> {
        let response = self
            .request(Method::DELETE, "transactions", &Self::owned_row(owner, id))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let _: Transaction = Self::single(response, &format!("Transaction {}", id)).await?;
        Ok(())
    }

    async fn insert_category(&self, owner: &str, name: &str) -> Result<Category> {
        let response = self
            .request(Method::POST, "categories", &[])
            .header("Prefer", "return=representation")
            .json(&[CategoryRow {
                user_id: owner,
                name,
            }])
            .send()
            .await?;
        Self::single(response, "inserted category")
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::Gateway("Insert returned no row".into()),
                other => other,
            })
    }

    fn name(&self) -> &str {
        "rest"
    }
}
