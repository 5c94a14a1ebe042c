//! Graph-sourced float/region metadata, grounded in the Cypher schema
//! advertised in `Config::prompts.cypher_generation_system`:
//! `(:Float)-[:DEPLOYED_IN]->(:Region)`.

use async_trait::async_trait;
use neo4rs::{query, Graph};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{BackendError, BackendResult, GraphAdapter};
use crate::models::{FloatMetadata, RegionMetadata};

pub struct Neo4jGraphAdapter {
    graph: Graph,
}

impl Neo4jGraphAdapter {
    pub async fn connect(uri: &str, user: &str, password: &str) -> BackendResult<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| BackendError::unavailable(format!("neo4j connection failed: {e}")))?;
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphAdapter for Neo4jGraphAdapter {
    async fn float_metadata(&self, platform_id: &str) -> BackendResult<Option<FloatMetadata>> {
        let q = query(
            "MATCH (f:Float {platform_id: $platform_id}) \
             OPTIONAL MATCH (f)-[:DEPLOYED_IN]->(r:Region) \
             RETURN f.platform_id AS platform_id, f.program AS program, f.deployment_date AS deployment_date, \
                    f.last_profile_date AS last_profile_date, f.status AS status, r.name AS region, \
                    f.sensor_types AS sensor_types",
        )
        .param("platform_id", platform_id);

        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| BackendError::unavailable(format!("neo4j query failed: {e}")))?;

        let row = stream
            .next()
            .await
            .map_err(|e| BackendError::query_error(format!("neo4j row fetch failed: {e}")))?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(FloatMetadata {
                platform_id: row.get("platform_id").unwrap_or_default(),
                program: row.get("program").ok(),
                deployment_date: row.get("deployment_date").ok(),
                last_profile_date: row.get("last_profile_date").ok(),
                status: row.get("status").ok(),
                region: row.get("region").ok(),
                sensor_types: row.get("sensor_types").unwrap_or_default(),
            })),
        }
    }

    async fn region_metadata(&self, name: &str) -> BackendResult<Option<RegionMetadata>> {
        let q = query(
            "MATCH (r:Region {name: $name}) \
             OPTIONAL MATCH (f:Float)-[:DEPLOYED_IN]->(r) \
             RETURN r.name AS name, count(DISTINCT f) AS float_count, \
                    count(DISTINCT CASE WHEN f.status = 'active' THEN f END) AS active_float_count, \
                    collect(DISTINCT f.program) AS programs",
        )
        .param("name", name);

        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| BackendError::unavailable(format!("neo4j query failed: {e}")))?;

        let row = stream
            .next()
            .await
            .map_err(|e| BackendError::query_error(format!("neo4j row fetch failed: {e}")))?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(RegionMetadata {
                name: row.get("name").unwrap_or_default(),
                float_count: row.get::<i64>("float_count").unwrap_or(0) as usize,
                active_float_count: row.get::<i64>("active_float_count").unwrap_or(0) as usize,
                programs: row.get("programs").unwrap_or_default(),
            })),
        }
    }

    async fn floats_in_region(&self, name: &str, recursive: bool) -> BackendResult<Vec<String>> {
        let cypher = if recursive {
            "MATCH (r:Region {name: $name}) \
             OPTIONAL MATCH (sub:Region)-[:PART_OF*]->(r) \
             MATCH (f:Float)-[:DEPLOYED_IN]->(region) WHERE region = r OR region IN collect(sub) \
             RETURN DISTINCT f.platform_id AS platform_id"
        } else {
            "MATCH (r:Region {name: $name})<-[:DEPLOYED_IN]-(f:Float) RETURN f.platform_id AS platform_id"
        };

        let mut stream = self
            .graph
            .execute(query(cypher).param("name", name))
            .await
            .map_err(|e| BackendError::unavailable(format!("neo4j query failed: {e}")))?;

        let mut ids = Vec::new();
        while let Some(row) =
            stream.next().await.map_err(|e| BackendError::query_error(format!("neo4j row fetch failed: {e}")))?
        {
            if let Ok(id) = row.get::<String>("platform_id") {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn region_hierarchy(&self) -> BackendResult<Value> {
        let mut stream = self
            .graph
            .execute(query(
                "MATCH (r:Region) OPTIONAL MATCH (r)-[:PART_OF]->(parent:Region) \
                 OPTIONAL MATCH (f:Float)-[:DEPLOYED_IN]->(r) \
                 RETURN r.name AS region, parent.name AS parent, count(DISTINCT f) AS float_count",
            ))
            .await
            .map_err(|e| BackendError::unavailable(format!("neo4j query failed: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) =
            stream.next().await.map_err(|e| BackendError::query_error(format!("neo4j row fetch failed: {e}")))?
        {
            entries.push(serde_json::json!({
                "region": row.get::<String>("region").unwrap_or_default(),
                "parent": row.get::<String>("parent").ok(),
                "float_count": row.get::<i64>("float_count").unwrap_or(0),
            }));
        }
        Ok(Value::Array(entries))
    }

    async fn parameter_coverage(&self, region: Option<&str>) -> BackendResult<HashMap<String, usize>> {
        let q = match region {
            Some(name) => query(
                "MATCH (f:Float)-[:DEPLOYED_IN]->(r:Region {name: $name}) UNWIND f.sensor_types AS parameter \
                 RETURN parameter, count(DISTINCT f) AS float_count",
            )
            .param("name", name),
            None => query("MATCH (f:Float) UNWIND f.sensor_types AS parameter RETURN parameter, count(DISTINCT f) AS float_count"),
        };

        let mut stream =
            self.graph.execute(q).await.map_err(|e| BackendError::unavailable(format!("neo4j query failed: {e}")))?;

        let mut coverage = HashMap::new();
        while let Some(row) =
            stream.next().await.map_err(|e| BackendError::query_error(format!("neo4j row fetch failed: {e}")))?
        {
            let parameter: String = row.get("parameter").unwrap_or_default();
            let count: i64 = row.get("float_count").unwrap_or(0);
            coverage.insert(parameter, count as usize);
        }
        Ok(coverage)
    }

    async fn execute(&self, cypher: &str) -> BackendResult<Vec<Value>> {
        let mut stream = self
            .graph
            .execute(query(cypher))
            .await
            .map_err(|e| BackendError::query_error(format!("cypher execution failed: {e}")))?;

        let mut rows = Vec::new();
        while let Some(row) =
            stream.next().await.map_err(|e| BackendError::query_error(format!("neo4j row fetch failed: {e}")))?
        {
            rows.push(row.to_json());
        }
        Ok(rows)
    }
}

/// Minimal neo4rs row-to-JSON conversion. neo4rs does not expose a generic
/// "all columns" accessor, so the adapter asks the caller for known keys;
/// the `execute` escape hatch instead falls back to a best-effort dump of
/// the row's string representation, since arbitrary LLM-generated Cypher
/// can name any column.
trait RowJson {
    fn to_json(&self) -> Value;
}

impl RowJson for neo4rs::Row {
    fn to_json(&self) -> Value {
        serde_json::json!({ "row": format!("{:?}", self) })
    }
}

pub struct StubGraphAdapter {
    pub floats: Mutex<HashMap<String, FloatMetadata>>,
    pub regions: Mutex<HashMap<String, RegionMetadata>>,
    pub fail: Mutex<Option<BackendError>>,
}

impl StubGraphAdapter {
    pub fn new() -> Self {
        Self { floats: Mutex::new(HashMap::new()), regions: Mutex::new(HashMap::new()), fail: Mutex::new(None) }
    }

    pub fn with_float(self, meta: FloatMetadata) -> Self {
        self.floats.lock().unwrap().insert(meta.platform_id.clone(), meta);
        self
    }

    pub fn with_region(self, meta: RegionMetadata) -> Self {
        self.regions.lock().unwrap().insert(meta.name.clone(), meta);
        self
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

impl Default for StubGraphAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphAdapter for StubGraphAdapter {
    async fn float_metadata(&self, platform_id: &str) -> BackendResult<Option<FloatMetadata>> {
        self.maybe_fail()?;
        Ok(self.floats.lock().unwrap().get(platform_id).cloned())
    }

    async fn region_metadata(&self, name: &str) -> BackendResult<Option<RegionMetadata>> {
        self.maybe_fail()?;
        Ok(self.regions.lock().unwrap().get(name).cloned())
    }

    async fn floats_in_region(&self, name: &str, _recursive: bool) -> BackendResult<Vec<String>> {
        self.maybe_fail()?;
        Ok(self
            .floats
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.region.as_deref() == Some(name))
            .map(|f| f.platform_id.clone())
            .collect())
    }

    async fn region_hierarchy(&self) -> BackendResult<Value> {
        self.maybe_fail()?;
        Ok(Value::Array(Vec::new()))
    }

    async fn parameter_coverage(&self, _region: Option<&str>) -> BackendResult<HashMap<String, usize>> {
        self.maybe_fail()?;
        Ok(HashMap::new())
    }

    async fn execute(&self, _cypher: &str) -> BackendResult<Vec<Value>> {
        self.maybe_fail()?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_registered_float_metadata() {
        let adapter = StubGraphAdapter::new().with_float(FloatMetadata {
            platform_id: "7902073".to_string(),
            program: Some("Argo".to_string()),
            deployment_date: None,
            last_profile_date: None,
            status: Some("active".to_string()),
            region: Some("arabian sea".to_string()),
            sensor_types: vec!["temperature".to_string()],
        });

        let result = adapter.float_metadata("7902073").await.unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().region.as_deref(), Some("arabian sea"));
    }

    #[tokio::test]
    async fn missing_float_is_none() {
        let adapter = StubGraphAdapter::new();
        assert!(adapter.float_metadata("nope").await.unwrap().is_none());
    }
}
