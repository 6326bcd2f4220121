//! Scenario 1: out-of-order responses.
//!
//! The history view asks for page 1 and then page 2 before page 1 has
//! answered. Page 2 answers first, page 1 last. The late page-1 response
//! must not replace page 2 on screen.

use std::sync::Arc;

use riskview_contracts::{error::RiskViewResult, query::QuerySettings};
use riskview_core::{Completion, HistoryView, QueryController};

use crate::api::{GatedRiskApi, MockRiskApi};

fn describe(completion: Option<Completion>) -> &'static str {
    match completion {
        Some(Completion::Committed) => "COMMITTED",
        Some(Completion::Failed) => "FAILED",
        Some(Completion::Stale) => "DISCARDED (stale)",
        None => "not issued",
    }
}

pub async fn run_scenario() -> RiskViewResult<()> {
    println!("=== Scenario 1: Out-of-order responses ===");
    println!();

    let api = Arc::new(GatedRiskApi::new(MockRiskApi::new()));
    let release_page_1 = api.hold(1);
    let release_page_2 = api.hold(2);

    let controller = QueryController::new(Arc::clone(&api), QuerySettings::default());
    let mut view = HistoryView::new(controller, "P1003");

    let first = view.load()?;
    let second = view.set_page(2)?;
    println!(
        "  Requested page 1 (epoch {:?}) then page 2 (epoch {:?})",
        first.epoch(),
        second.epoch()
    );

    let _ = release_page_2.send(());
    let second = second.settled().await;
    println!("  Page 2 answered first:  {}", describe(second));

    let _ = release_page_1.send(());
    let first = first.settled().await;
    println!("  Page 1 answered last:   {}", describe(first));
    println!();

    let snapshot = view.snapshot();
    println!(
        "  On screen: page {} of {} ({} rows), status {:?}",
        snapshot.page,
        snapshot.page_count,
        snapshot.rows.len(),
        snapshot.status
    );
    println!(
        "  Committed key: {}",
        view.controller()
            .state()
            .key
            .map(|key| key.to_string())
            .unwrap_or_default()
    );
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(())
}
