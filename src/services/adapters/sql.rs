//! Time-series measurements backend, grounded in the `measurements` schema
//! advertised to the LLM in `Config::prompts.sql_generation_system`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{AggregationBucket, BackendError, BackendResult, SqlAdapter};
use crate::models::{BoundingBox, Measurement, Parameter, Statistics, TemporalBounds};

pub struct SqlxSqlAdapter {
    pool: PgPool,
}

impl SqlxSqlAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_measurement(row: &sqlx::postgres::PgRow) -> Result<Measurement, sqlx::Error> {
        Ok(Measurement {
            platform_id: row.try_get("platform_id")?,
            time: row.try_get("time")?,
            lat: row.try_get("lat")?,
            lon: row.try_get("lon")?,
            pressure: row.try_get("pressure")?,
            temperature: row.try_get("temperature")?,
            salinity: row.try_get("salinity")?,
        })
    }

    fn param_column(param: Parameter) -> &'static str {
        match param {
            Parameter::Temperature => "temperature",
            Parameter::Salinity => "salinity",
            Parameter::Pressure => "pressure",
        }
    }
}

#[async_trait]
impl SqlAdapter for SqlxSqlAdapter {
    async fn measurements_by_float(
        &self,
        platform_id: &str,
        time_range: Option<TemporalBounds>,
        limit: usize,
    ) -> BackendResult<Vec<Measurement>> {
        let rows = if let Some(range) = time_range {
            sqlx::query(
                "SELECT platform_id, time, lat, lon, pressure, temperature, salinity FROM measurements \
                 WHERE platform_id = $1 AND time >= $2 AND time <= $3 ORDER BY time DESC LIMIT $4",
            )
            .bind(platform_id)
            .bind(range.start)
            .bind(range.end)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT platform_id, time, lat, lon, pressure, temperature, salinity FROM measurements \
                 WHERE platform_id = $1 ORDER BY time DESC LIMIT $2",
            )
            .bind(platform_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| {
            tracing::error!("measurements_by_float query failed: {}", e);
            BackendError::unavailable(format!("sql query failed: {e}"))
        })?;

        rows.iter()
            .map(Self::row_to_measurement)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::query_error(format!("row decode failed: {e}")))
    }

    async fn measurements_by_region(
        &self,
        bbox: BoundingBox,
        time_range: Option<TemporalBounds>,
        limit: usize,
    ) -> BackendResult<Vec<Measurement>> {
        let rows = if let Some(range) = time_range {
            sqlx::query(
                "SELECT platform_id, time, lat, lon, pressure, temperature, salinity FROM measurements \
                 WHERE lat BETWEEN $1 AND $2 AND lon BETWEEN $3 AND $4 AND time >= $5 AND time <= $6 \
                 ORDER BY time DESC LIMIT $7",
            )
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lon)
            .bind(bbox.max_lon)
            .bind(range.start)
            .bind(range.end)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT platform_id, time, lat, lon, pressure, temperature, salinity FROM measurements \
                 WHERE lat BETWEEN $1 AND $2 AND lon BETWEEN $3 AND $4 ORDER BY time DESC LIMIT $5",
            )
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lon)
            .bind(bbox.max_lon)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| {
            tracing::error!("measurements_by_region query failed: {}", e);
            BackendError::unavailable(format!("sql query failed: {e}"))
        })?;

        rows.iter()
            .map(Self::row_to_measurement)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::query_error(format!("row decode failed: {e}")))
    }

    async fn stats(
        &self,
        platform_id: &str,
        param: Parameter,
        depth_range: (f64, f64),
        time_range: Option<TemporalBounds>,
    ) -> BackendResult<Option<Statistics>> {
        let column = Self::param_column(param);
        let sql = format!(
            "SELECT {column} FROM measurements WHERE platform_id = $1 AND pressure BETWEEN $2 AND $3{}",
            if time_range.is_some() { " AND time >= $4 AND time <= $5" } else { "" }
        );

        let mut query = sqlx::query(&sql).bind(platform_id).bind(depth_range.0).bind(depth_range.1);
        if let Some(range) = time_range {
            query = query.bind(range.start).bind(range.end);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("stats query failed: {}", e);
            BackendError::unavailable(format!("sql query failed: {e}"))
        })?;

        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|r| r.try_get::<Option<f64>, _>(column.as_ref() as &str))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::query_error(format!("row decode failed: {e}")))?;

        Ok(Statistics::compute(values))
    }

    async fn aggregate(
        &self,
        platform_id: &str,
        param: Parameter,
        bucket: AggregationBucket,
        time_range: Option<TemporalBounds>,
    ) -> BackendResult<Vec<Value>> {
        let column = Self::param_column(param);
        let trunc = match bucket {
            AggregationBucket::Day => "day",
            AggregationBucket::Week => "week",
            AggregationBucket::Month => "month",
        };
        let sql = format!(
            "SELECT date_trunc('{trunc}', time) AS bucket, avg({column}) AS mean, stddev({column}) AS std, \
             count({column}) AS count FROM measurements WHERE platform_id = $1{} GROUP BY bucket ORDER BY bucket DESC",
            if time_range.is_some() { " AND time >= $2 AND time <= $3" } else { "" }
        );

        let mut query = sqlx::query(&sql).bind(platform_id);
        if let Some(range) = time_range {
            query = query.bind(range.start).bind(range.end);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("aggregate query failed: {}", e);
            BackendError::unavailable(format!("sql query failed: {e}"))
        })?;

        rows.iter()
            .map(|r| row_to_json(r).map_err(|e| BackendError::query_error(format!("row decode failed: {e}"))))
            .collect()
    }

    async fn execute(&self, sql: &str) -> BackendResult<Vec<Value>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("custom sql execution failed: {}", e);
            BackendError::query_error(format!("sql execution failed: {e}"))
        })?;

        rows.iter()
            .map(|r| row_to_json(r).map_err(|e| BackendError::query_error(format!("row decode failed: {e}"))))
            .collect()
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Result<Value, sqlx::Error> {
    let mut obj = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name();
        let value: Value = if let Ok(v) = row.try_get::<f64, _>(name) {
            serde_json::json!(v)
        } else if let Ok(v) = row.try_get::<i64, _>(name) {
            serde_json::json!(v)
        } else if let Ok(v) = row.try_get::<String, _>(name) {
            serde_json::json!(v)
        } else if let Ok(v) = row.try_get::<DateTime<Utc>, _>(name) {
            serde_json::json!(v)
        } else {
            Value::Null
        };
        obj.insert(name.to_string(), value);
    }
    Ok(Value::Object(obj))
}

/// Fixed, seedable in-memory stub used exclusively by tests.
pub struct StubSqlAdapter {
    pub measurements: Mutex<Vec<Measurement>>,
    pub fail: Mutex<Option<BackendError>>,
}

impl StubSqlAdapter {
    pub fn new(measurements: Vec<Measurement>) -> Self {
        Self { measurements: Mutex::new(measurements), fail: Mutex::new(None) }
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
impl SqlAdapter for StubSqlAdapter {
    async fn measurements_by_float(
        &self,
        platform_id: &str,
        _time_range: Option<TemporalBounds>,
        limit: usize,
    ) -> BackendResult<Vec<Measurement>> {
        self.maybe_fail()?;
        let rows = self.measurements.lock().unwrap();
        Ok(rows.iter().filter(|m| m.platform_id == platform_id).take(limit).cloned().collect())
    }

    async fn measurements_by_region(
        &self,
        bbox: BoundingBox,
        _time_range: Option<TemporalBounds>,
        limit: usize,
    ) -> BackendResult<Vec<Measurement>> {
        self.maybe_fail()?;
        let rows = self.measurements.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| m.lat >= bbox.min_lat && m.lat <= bbox.max_lat && m.lon >= bbox.min_lon && m.lon <= bbox.max_lon)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn stats(
        &self,
        platform_id: &str,
        param: Parameter,
        _depth_range: (f64, f64),
        _time_range: Option<TemporalBounds>,
    ) -> BackendResult<Option<Statistics>> {
        self.maybe_fail()?;
        let rows = self.measurements.lock().unwrap();
        let values = rows.iter().filter(|m| m.platform_id == platform_id).map(|m| match param {
            Parameter::Temperature => m.temperature,
            Parameter::Salinity => m.salinity,
            Parameter::Pressure => m.pressure,
        });
        Ok(Statistics::compute(values))
    }

    async fn aggregate(
        &self,
        _platform_id: &str,
        _param: Parameter,
        _bucket: AggregationBucket,
        _time_range: Option<TemporalBounds>,
    ) -> BackendResult<Vec<Value>> {
        self.maybe_fail()?;
        Ok(Vec::new())
    }

    async fn execute(&self, _sql: &str) -> BackendResult<Vec<Value>> {
        self.maybe_fail()?;
        let rows = self.measurements.lock().unwrap();
        Ok(rows
            .iter()
            .map(|m| {
                serde_json::json!({
                    "platform_id": m.platform_id,
                    "time": m.time,
                    "lat": m.lat,
                    "lon": m.lon,
                    "pressure": m.pressure,
                    "temperature": m.temperature,
                    "salinity": m.salinity,
                })
            })
            .collect())
    }
}

#[allow(unused_imports)]
use sqlx::Column;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(platform_id: &str, lat: f64, lon: f64) -> Measurement {
        Measurement {
            platform_id: platform_id.to_string(),
            time: Utc::now(),
            lat,
            lon,
            pressure: Some(10.0),
            temperature: Some(20.0),
            salinity: Some(35.0),
        }
    }

    #[tokio::test]
    async fn filters_by_platform_id() {
        let adapter = StubSqlAdapter::new(vec![sample("a", 0.0, 0.0), sample("b", 0.0, 0.0)]);
        let result = adapter.measurements_by_float("a", None, 10).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].platform_id, "a");
    }

    #[tokio::test]
    async fn propagates_configured_failure() {
        let adapter = StubSqlAdapter::new(vec![]);
        adapter.set_failing(BackendError::unavailable("down"));
        assert!(adapter.measurements_by_float("a", None, 10).await.is_err());
    }
}
