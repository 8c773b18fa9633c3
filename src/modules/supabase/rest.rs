use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::client::{Auth, SupabaseClient};
use super::query::Query;
use crate::core::error::{AppError, Result};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

impl SupabaseClient {
    fn table_url(&self, table: &str, query: &Query) -> String {
        let qs = query.to_query_string();
        if qs.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, table, qs)
        }
    }

    /// Fetch all rows of `table` visible to the caller that match `query`
    pub async fn select<T: DeserializeOwned>(
        &self,
        auth: Auth<'_>,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>> {
        let builder = self.http_client.get(self.table_url(table, query));
        self.send_json(self.authorize(builder, auth), table).await
    }

    /// Fetch the first matching row, if any
    pub async fn select_optional<T: DeserializeOwned>(
        &self,
        auth: Auth<'_>,
        table: &str,
        query: &Query,
    ) -> Result<Option<T>> {
        let rows: Vec<T> = self.select(auth, table, &query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row and return it as stored
    pub async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        auth: Auth<'_>,
        table: &str,
        body: &B,
    ) -> Result<T> {
        let builder = self
            .http_client
            .post(self.table_url(table, &Query::new()))
            .header("Prefer", RETURN_REPRESENTATION)
            .header("Accept", SINGLE_OBJECT)
            .json(body);
        self.send_json(self.authorize(builder, auth), table).await
    }

    /// Insert or merge one row on `conflict_columns`
    pub async fn upsert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        auth: Auth<'_>,
        table: &str,
        body: &B,
        conflict_columns: &str,
    ) -> Result<T> {
        let query = Query::new().on_conflict(conflict_columns);
        let builder = self
            .http_client
            .post(self.table_url(table, &query))
            .header(
                "Prefer",
                format!("{},resolution=merge-duplicates", RETURN_REPRESENTATION),
            )
            .header("Accept", SINGLE_OBJECT)
            .json(body);
        self.send_json(self.authorize(builder, auth), table).await
    }

    /// Patch every matching row, returning the updated rows
    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        auth: Auth<'_>,
        table: &str,
        query: &Query,
        body: &B,
    ) -> Result<Vec<T>> {
        if !query.has_filters() {
            return Err(AppError::Internal(format!(
                "Refusing unfiltered update on {}",
                table
            )));
        }

        let builder = self
            .http_client
            .patch(self.table_url(table, query))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        self.send_json(self.authorize(builder, auth), table).await
    }

    /// Delete every matching row, returning the deleted rows
    pub async fn delete<T: DeserializeOwned>(
        &self,
        auth: Auth<'_>,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>> {
        if !query.has_filters() {
            return Err(AppError::Internal(format!(
                "Refusing unfiltered delete on {}",
                table
            )));
        }

        let builder = self
            .http_client
            .delete(self.table_url(table, query))
            .header("Prefer", RETURN_REPRESENTATION);
        self.send_json(self.authorize(builder, auth), table).await
    }

    /// Invoke a stored procedure by name
    pub async fn rpc(&self, auth: Auth<'_>, function: &str, params: &Value) -> Result<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        let builder = self.http_client.post(url).json(params);
        let response = self
            .send(self.authorize(builder, auth), function)
            .await?;

        // Void functions answer 204 with no body
        let text = response.text().await.map_err(|e| AppError::Upstream {
            status: 502,
            message: format!("Failed to read backend response: {}", e),
        })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| AppError::Upstream {
            status: 502,
            message: format!("Failed to parse backend response: {}", e),
        })
    }
}
