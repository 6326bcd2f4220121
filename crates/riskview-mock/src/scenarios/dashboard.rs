//! Scenario 4: single-flight dashboard refresh.
//!
//! Two refresh triggers arrive while the first is still running. Only one
//! feed request reaches the service.

use std::{sync::Arc, time::Duration};

use riskview_contracts::{error::RiskViewResult, query::QuerySettings};
use riskview_core::{
    classifier::{format_percent, headline},
    QueryController, RefreshOutcome, ViewAggregator,
};

use crate::api::MockRiskApi;

pub async fn run_scenario() -> RiskViewResult<()> {
    println!("=== Scenario 4: Dashboard refresh ===");
    println!();

    let api = Arc::new(MockRiskApi::new().with_latency(Duration::from_millis(50)));
    let controller = QueryController::new(Arc::clone(&api), QuerySettings::default());
    let aggregator = ViewAggregator::new(api, controller);

    let (first, second) = tokio::join!(aggregator.refresh(), aggregator.refresh());
    let outcomes = [first?, second?];
    let ran = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, RefreshOutcome::Refreshed(_)))
        .count();
    println!("  Two triggers, {ran} refresh ran, {} ignored", outcomes.len() - ran);
    println!();

    let Some(snapshot) = aggregator.latest() else {
        println!("  No snapshot produced");
        return Ok(());
    };
    let stats = &snapshot.stats;
    println!("  Total predictions:  {}", stats.total_predictions);
    println!("  High-risk patients: {}", stats.high_risk);
    println!("  Alerts triggered:   {}", stats.alerts_triggered);
    println!(
        "  Average risk:       {}",
        stats.average_risk.map(format_percent).unwrap_or_else(|| "n/a".to_string())
    );
    println!(
        "  System:             model {}, alerts {}",
        snapshot.system_status.model_status, snapshot.system_status.alert_system
    );
    println!();
    for prediction in &snapshot.recent_predictions {
        println!(
            "    {:<6} {:<18} {}",
            prediction.record.id,
            headline(prediction.record.risk_score),
            if prediction.record.alert_triggered { "alert" } else { "" }
        );
    }
    println!();
    println!("  Scenario 4 complete.");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn runs() {
        super::run_scenario().await.unwrap();
    }
}
