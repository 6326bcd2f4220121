//! Scenario 3: user intent beats the system signal.

use riskview_contracts::{error::RiskViewResult, preference::PreferenceState};
use riskview_core::traits::PreferenceStorage;
use riskview_prefs::{InMemoryPreferenceStorage, PreferenceStore};

fn show(label: &str, state: PreferenceState) {
    println!("  {label:<34} mode={:<5} origin={:?}", state.mode.as_str(), state.origin);
}

pub async fn run_scenario() -> RiskViewResult<()> {
    println!("=== Scenario 3: Presentation preference ===");
    println!();

    let storage = InMemoryPreferenceStorage::new();
    let store = PreferenceStore::initialize(Box::new(storage.clone()), Some(true));
    show("Start, OS prefers dark:", store.state());

    store.apply_system_signal(false);
    show("OS switches to light:", store.state());

    store.toggle();
    show("User toggles:", store.state());

    let applied = store.apply_system_signal(false);
    show(&format!("OS says light (applied: {applied}):"), store.state());
    println!();

    drop(store);
    let restarted = PreferenceStore::initialize(Box::new(storage.clone()), Some(false));
    show("Restart, OS prefers light:", restarted.state());

    storage.clear()?;
    let applied = restarted.apply_system_signal(false);
    show(&format!("Stored value cleared (applied: {applied}):"), restarted.state());
    println!();
    println!("  Scenario 3 complete.");
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
