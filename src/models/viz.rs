use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chart family named by the Coordinator. Kept as a closed enum rather than
/// a free string so an unrenderable type is a compile error, not a typo on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Line,
    Area,
    Scatter,
    Scatter3d,
    Composed,
    Bar,
    MapPoints,
    Heatmap,
}

/// Tabular payload backing a chart: column names plus row-major values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartData {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub data: ChartData,
    pub encodings: Value,
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub styling: Value,
}

/// The Coordinator's final fusion of per-agent evidence: a narrative plus
/// an optional set of chart specs. Emitted only when the leading result has
/// rows and the fields a chart type needs are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorOutput {
    pub narrative: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualizations: Option<Vec<ChartSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated_row_count: Option<usize>,
}
