// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Visualization recommendation.
//!
//! A single low-temperature LM call over a locally-built data summary.
//! Infallible by contract: parse failures fall back to a table view and an
//! unavailable LM degrades to `none`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use askdb_core::{CompletionRequest, LmProvider, Scalar, TableData};
use askdb_lm::parse::extract_json;

use crate::prompts;

const VIZ_TEMPERATURE: f32 = 0.1;
/// Sample values inspected per column when inferring a type.
const TYPE_SAMPLE: usize = 10;

/// Chart kinds the boundary understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    Line,
    Pie,
    Scatter,
    Table,
    None,
}

/// The boundary's recommendation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizRecommendation {
    pub kind: ChartKind,
    pub reason: String,
}

/// Recommends a chart for a result sample.
pub struct VisualizationAdvisor {
    lm: Arc<dyn LmProvider>,
}

impl VisualizationAdvisor {
    pub fn new(lm: Arc<dyn LmProvider>) -> Self {
        Self { lm }
    }

    /// Never fails: empty data recommends a table, an unavailable LM
    /// recommends `none`, and an unparseable response falls back to a table.
    pub async fn recommend(
        &self,
        question: &str,
        sql: &str,
        sample: &TableData,
    ) -> VizRecommendation {
        if sample.rows.is_empty() {
            return VizRecommendation {
                kind: ChartKind::Table,
                reason: "no data rows to visualize".to_string(),
            };
        }

        let summary = data_summary(sample);
        let prompt = prompts::visualization(question, sql, &summary);
        let request = CompletionRequest::new(prompt, VIZ_TEMPERATURE);

        let response = match self.lm.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "visualization call failed, degrading to none");
                return VizRecommendation {
                    kind: ChartKind::None,
                    reason: "language model unavailable".to_string(),
                };
            }
        };

        match extract_json(&response).and_then(|v| serde_json::from_value(v).ok()) {
            Some(rec) => rec,
            None => VizRecommendation {
                kind: ChartKind::Table,
                reason: "recommendation did not parse, defaulting to table".to_string(),
            },
        }
    }
}

/// Builds the compact per-column summary embedded in the prompt.
fn data_summary(table: &TableData) -> serde_json::Value {
    let columns: Vec<serde_json::Value> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<&Scalar> = table
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .take(TYPE_SAMPLE)
                .collect();
            let uniques = table
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|v| format!("{v:?}"))
                .collect::<std::collections::HashSet<_>>()
                .len();
            serde_json::json!({
                "name": name,
                "type": infer_type(&values),
                "unique_values": uniques,
            })
        })
        .collect();
    serde_json::json!({
        "row_count": table.row_count(),
        "columns": columns,
    })
}

/// Coarse column typing from sample values: numeric, year, date, or text.
fn infer_type(values: &[&Scalar]) -> &'static str {
    let non_null: Vec<&&Scalar> = values.iter().filter(|v| !v.is_null()).collect();
    if non_null.is_empty() {
        return "unknown";
    }

    if non_null.iter().all(|v| v.is_numeric()) {
        let all_yearish = non_null.iter().all(|v| match v {
            Scalar::Int(i) => (1900..=2100).contains(i),
            _ => false,
        });
        return if all_yearish { "year" } else { "numeric" };
    }

    let dateish = non_null
        .iter()
        .filter(|v| match v {
            Scalar::Text(t) => looks_like_date(t),
            _ => false,
        })
        .count();
    if dateish * 2 > non_null.len() {
        return "date";
    }
    "text"
}

fn looks_like_date(text: &str) -> bool {
    let has_digits = text.chars().filter(|c| c.is_ascii_digit()).count() >= 4;
    has_digits && (text.contains('-') || text.contains('/') || text.contains(':'))
}
