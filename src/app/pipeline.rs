//! Shared pipeline used by both the CLI and the dashboard.
//!
//! fetch -> normalize -> aggregate (monthly, per segment, correlation, asset counts)
//!
//! Persisting is a separate step (`persist`) so nothing touches the artifact
//! until every stage above has succeeded.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{error, info};

use crate::data::CadprevClient;
use crate::domain::{
    CorrelationMatrix, MonthlySummary, NormalizedRow, PeriodScheme, QueryParameters, SegmentAssetCount,
    SegmentSummary,
};
use crate::error::AppError;
use crate::io::ingest::{NormalizeError, normalize};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub query: QueryParameters,
    pub rows: Vec<NormalizedRow>,
    pub monthly: MonthlySummary,
    pub segments: SegmentSummary,
    pub correlation: Option<CorrelationMatrix>,
    pub asset_counts: Vec<SegmentAssetCount>,
}

/// Fetch and process one year of portfolio data.
pub fn run_fetch(
    client: &CadprevClient,
    query: &QueryParameters,
    scheme: PeriodScheme,
) -> Result<RunOutput, AppError> {
    info!("Querying API with parameters: {:?}", query);
    let payload = client.fetch(query)?;

    let json = payload
        .json()
        .map_err(|e| NormalizeError::Malformed(format!("response is not valid JSON: {e}")))
        .inspect_err(|e| error!("{e}"))?;

    run_with_payload(query, &json, scheme)
}

/// Process an already-parsed payload.
pub fn run_with_payload(
    query: &QueryParameters,
    payload: &Value,
    scheme: PeriodScheme,
) -> Result<RunOutput, AppError> {
    let rows = normalize(payload, scheme).inspect_err(|e| error!("Failed to process API data: {e}"))?;

    let monthly = crate::report::aggregate(&rows);
    let segments = crate::report::aggregate_by_segment(&rows);
    let correlation = crate::report::correlate(&rows);
    let asset_counts = crate::report::count_assets_by_segment(&rows);

    for r in &monthly.rows {
        info!("{}: {:.2}", r.month, r.total_value);
    }

    Ok(RunOutput {
        query: query.clone(),
        rows,
        monthly,
        segments,
        correlation,
        asset_counts,
    })
}

/// Write the monthly summary, creating the parent directory first.
pub fn persist(run: &RunOutput, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create data dir '{}': {e}", parent.display())))?;
    }
    crate::io::export::save_summary_csv(path, &run.monthly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Month;
    use serde_json::json;

    fn query() -> QueryParameters {
        QueryParameters {
            entity_id: "29131075000193".to_string(),
            region: "RJ".to_string(),
            year: 2025,
        }
    }

    #[test]
    fn reference_scenario_sums_by_month() {
        let payload = json!({"data": [
            {"dt_mes_bimestre": 1, "vl_total_atual": "100,50"},
            {"dt_mes_bimestre": 1, "vl_total_atual": "50,00"},
            {"dt_mes_bimestre": 2, "vl_total_atual": "25,00"}
        ]});
        let run = run_with_payload(&query(), &payload, PeriodScheme::Monthly).unwrap();
        assert_eq!(run.monthly.months(), vec![Month::Janeiro, Month::Fevereiro]);
        assert_eq!(run.monthly.get(Month::Janeiro), Some(150.50));
        assert_eq!(run.monthly.get(Month::Fevereiro), Some(25.00));
        assert!(run.correlation.is_none());
    }

    #[test]
    fn mapping_error_exits_with_code_three() {
        let payload = json!({"data": [{"dt_mes_bimestre": 13, "vl_total_atual": "1"}]});
        let err = run_with_payload(&query(), &payload, PeriodScheme::Monthly).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
