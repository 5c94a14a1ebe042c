//! Vector-similarity backend, grounded in Pinecone's query/fetch HTTP API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

use super::{BackendError, BackendResult, SemanticFilters, VectorAdapter};
use crate::models::{SemanticHit, TemporalBounds};

pub struct PineconeVectorAdapter {
    http_client: Client,
    index_url: String,
    api_key: String,
}

impl PineconeVectorAdapter {
    pub fn new(index_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build vector store http client");
        Self { http_client, index_url: index_url.into(), api_key: api_key.into() }
    }

    async fn query(&self, body: QueryRequest) -> BackendResult<Vec<SemanticHit>> {
        let url = format!("{}/query", self.index_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::unavailable(format!("vector store request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::unavailable(format!("vector store returned {status}: {text}")));
        }

        let parsed: QueryResponse =
            response.json().await.map_err(|e| BackendError::query_error(format!("malformed vector response: {e}")))?;

        let mut hits: Vec<SemanticHit> = parsed
            .matches
            .into_iter()
            .filter_map(|m| {
                let platform_id = m.metadata.get("platform_id")?.as_str()?.to_string();
                let time = m.metadata.get("time")?.as_str().and_then(|s| s.parse::<DateTime<Utc>>().ok())?;
                let text = m
                    .metadata
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Some(SemanticHit { platform_id, time, text, score: m.score })
            })
            .collect();
        hits.sort_by(SemanticHit::cmp_rank);
        Ok(hits)
    }
}

#[async_trait]
impl VectorAdapter for PineconeVectorAdapter {
    async fn semantic_search(
        &self,
        query_vector: &[f32; 384],
        k: usize,
        filters: SemanticFilters,
    ) -> BackendResult<Vec<SemanticHit>> {
        let mut filter = serde_json::Map::new();
        if let Some(region) = filters.region {
            filter.insert("region".to_string(), serde_json::json!(region));
        }
        if let Some(range) = filters.time_range {
            filter.insert(
                "time".to_string(),
                serde_json::json!({ "$gte": range.start.timestamp(), "$lte": range.end.timestamp() }),
            );
        }
        if let Some(param) = filters.parameter {
            filter.insert("parameters".to_string(), serde_json::json!(format!("{:?}", param).to_lowercase()));
        }

        self.query(QueryRequest {
            vector: query_vector.to_vec(),
            top_k: k,
            filter: if filter.is_empty() { None } else { Some(Value::Object(filter)) },
            include_metadata: true,
        })
        .await
    }

    async fn nearest(
        &self,
        platform_id: &str,
        time: DateTime<Utc>,
        k: usize,
        min_score: f64,
    ) -> BackendResult<Vec<SemanticHit>> {
        let vector_id = format!("{platform_id}_{}", time.to_rfc3339());
        let url = format!("{}/vectors/fetch?ids={vector_id}", self.index_url.trim_end_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| BackendError::unavailable(format!("vector store request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(BackendError::unavailable("vector fetch failed".to_string()));
        }

        let fetched: FetchResponse =
            response.json().await.map_err(|e| BackendError::query_error(format!("malformed fetch response: {e}")))?;

        let Some(vector) = fetched.vectors.get(&vector_id) else {
            return Err(BackendError::query_error(format!("no vector found for {vector_id}")));
        };

        let hits = self
            .query(QueryRequest { vector: vector.values.clone(), top_k: k + 1, filter: None, include_metadata: true })
            .await?;

        Ok(hits.into_iter().filter(|h| h.score >= min_score && h.platform_id != platform_id).take(k).collect())
    }

    async fn similar_profiles(
        &self,
        platform_id: &str,
        time_range: TemporalBounds,
        k: usize,
        min_score: f64,
    ) -> BackendResult<Vec<SemanticHit>> {
        let hits = self
            .semantic_search(
                &[0.0f32; 384],
                k,
                SemanticFilters { region: None, time_range: Some(time_range), parameter: None },
            )
            .await?;

        Ok(hits.into_iter().filter(|h| h.score >= min_score && h.platform_id == platform_id).collect())
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    score: f64,
    #[serde(default)]
    metadata: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    vectors: std::collections::HashMap<String, FetchedVector>,
}

#[derive(Debug, Deserialize)]
struct FetchedVector {
    values: Vec<f32>,
}

pub struct StubVectorAdapter {
    pub hits: Mutex<Vec<SemanticHit>>,
    pub fail: Mutex<Option<BackendError>>,
}

impl StubVectorAdapter {
    pub fn new(hits: Vec<SemanticHit>) -> Self {
        Self { hits: Mutex::new(hits), fail: Mutex::new(None) }
    }

    pub fn set_failing(&self, error: BackendError) {
        *self.fail.lock().unwrap() = Some(error);
    }

    fn maybe_fail(&self) -> BackendResult<()> {
        if let Some(err) = self.fail.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl VectorAdapter for StubVectorAdapter {
    async fn semantic_search(
        &self,
        _query_vector: &[f32; 384],
        k: usize,
        filters: SemanticFilters,
    ) -> BackendResult<Vec<SemanticHit>> {
        self.maybe_fail()?;
        let mut hits = self.hits.lock().unwrap().clone();
        if filters.region.is_some() {
            // stub does not model region metadata on hits; region filters are a no-op here.
        }
        hits.sort_by(SemanticHit::cmp_rank);
        hits.truncate(k);
        Ok(hits)
    }

    async fn nearest(
        &self,
        platform_id: &str,
        _time: DateTime<Utc>,
        k: usize,
        min_score: f64,
    ) -> BackendResult<Vec<SemanticHit>> {
        self.maybe_fail()?;
        let hits = self.hits.lock().unwrap();
        Ok(hits
            .iter()
            .filter(|h| h.platform_id != platform_id && h.score >= min_score)
            .take(k)
            .cloned()
            .collect())
    }

    async fn similar_profiles(
        &self,
        platform_id: &str,
        _time_range: TemporalBounds,
        k: usize,
        min_score: f64,
    ) -> BackendResult<Vec<SemanticHit>> {
        self.maybe_fail()?;
        let hits = self.hits.lock().unwrap();
        Ok(hits
            .iter()
            .filter(|h| h.platform_id == platform_id && h.score >= min_score)
            .take(k)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn truncates_to_k_and_orders_by_rank() {
        let now = Utc::now();
        let adapter = StubVectorAdapter::new(vec![
            SemanticHit { platform_id: "a".into(), time: now, text: "x".into(), score: 0.5 },
            SemanticHit { platform_id: "b".into(), time: now, text: "y".into(), score: 0.9 },
        ]);
        let hits = adapter
            .semantic_search(&[0.0; 384], 1, SemanticFilters::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].platform_id, "b");
    }
}
