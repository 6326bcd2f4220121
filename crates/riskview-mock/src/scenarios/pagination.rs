//! Scenario 2: pagination guard and time filter.
//!
//! P1001 has 12 stored predictions; at 5 per page that is 3 pages. Asking
//! for page 4 is rejected before anything is sent. Changing the time filter
//! returns to page 1.

use std::sync::Arc;

use riskview_contracts::{error::RiskViewResult, query::QuerySettings, record::TimeFilter};
use riskview_core::{HistoryView, QueryController};

use crate::api::MockRiskApi;

pub async fn run_scenario() -> RiskViewResult<()> {
    println!("=== Scenario 2: Pagination guard ===");
    println!();

    let api = Arc::new(MockRiskApi::new());
    let controller = QueryController::new(api, QuerySettings::default());
    let mut view = HistoryView::new(controller, "P1001");

    view.load()?.settled().await;
    let snapshot = view.snapshot();
    println!(
        "  P1001: {} records, {} pages, pagination shown: {}",
        view.controller()
            .state()
            .data
            .map(|page| page.total_records)
            .unwrap_or(0),
        snapshot.page_count,
        snapshot.show_pagination
    );

    view.set_page(3)?.settled().await;
    println!("  Page 3: {} rows", view.snapshot().rows.len());

    match view.next_page() {
        Ok(_) => println!("  Page 4: unexpectedly dispatched"),
        Err(err) => println!("  Page 4: REJECTED ({err})"),
    }
    println!("  View stays on page {}", view.page());
    println!();

    view.set_time_filter(TimeFilter::Week)?.settled().await;
    let snapshot = view.snapshot();
    println!(
        "  Filter '{}': page {} of {}",
        TimeFilter::Week.label(),
        snapshot.page,
        snapshot.page_count
    );
    if let Some(row) = snapshot.rows.first() {
        println!(
            "  Latest: {} at {}",
            riskview_core::classifier::headline(row.record.risk_score),
            row.record.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}
