//! Randomized checks of the ledger transfer bounds and of cycle catch-up.
//!
//! Container sets mix resources, capacities and locked containers so the
//! greedy walk sees every ordering it can meet aboard a real vessel.

use proptest::prelude::*;
use snacks_logic::constants::resources;
use snacks_logic::ledger::{ContainerLedger, ResourceContainer, ResourceLedger};
use snacks_logic::processor::{ProcessorDefinition, ResourceProcessor};
use snacks_logic::result::CrewContext;
use snacks_logic::rule::ProcessedResource;

// ── Helpers ────────────────────────────────────────────────────────────

const TOLERANCE: f64 = 1e-9;

fn container() -> impl Strategy<Value = ResourceContainer> {
    (
        prop::sample::select(vec![resources::SNACKS, resources::SOIL]),
        0.0..100.0f64,
        0.0..100.0f64,
        any::<bool>(),
    )
        .prop_map(|(name, amount, max, flow)| {
            ResourceContainer::new(name, amount, max).with_flow(flow)
        })
}

fn ledger() -> impl Strategy<Value = ContainerLedger> {
    prop::collection::vec(container(), 0..6).prop_map(|containers| {
        containers
            .into_iter()
            .fold(ContainerLedger::new(), ContainerLedger::with_container)
    })
}

fn amounts() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..60.0f64, 1..8)
}

fn assert_containers_in_bounds(ledger: &ContainerLedger) -> Result<(), TestCaseError> {
    for c in ledger.containers() {
        prop_assert!(c.amount() >= 0.0, "container went negative: {c:?}");
        prop_assert!(c.amount() <= c.max_amount(), "container overfilled: {c:?}");
    }
    Ok(())
}

fn assert_same_contents(a: &ContainerLedger, b: &ContainerLedger) -> Result<(), TestCaseError> {
    prop_assert_eq!(a.containers().len(), b.containers().len());
    for (x, y) in a.containers().iter().zip(b.containers()) {
        prop_assert!((x.amount() - y.amount()).abs() < 1e-6, "{x:?} vs {y:?}");
    }
    Ok(())
}

fn snacks_processor(seconds_per_cycle: f64) -> ResourceProcessor {
    ResourceProcessor::new(
        ProcessorDefinition::new("Snacks!", seconds_per_cycle)
            .with_input(ProcessedResource::input(resources::SNACKS, 1.0))
            .with_output(ProcessedResource::output(resources::SOIL, 1.0).related_to(resources::SNACKS)),
    )
}

// ── Properties ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn request_stays_within_demand_and_stock(mut ledger in ledger(), demands in amounts()) {
        for demand in demands {
            let before = ledger.amount(resources::SNACKS);
            let got = ledger.request(resources::SNACKS, demand);

            prop_assert!(got >= 0.0);
            prop_assert!(got <= demand + TOLERANCE);
            prop_assert!(got <= before + TOLERANCE);
            prop_assert!((ledger.amount(resources::SNACKS) - (before - got)).abs() < 1e-6);
            assert_containers_in_bounds(&ledger)?;
        }
    }

    #[test]
    fn deposit_stays_within_free_space(mut ledger in ledger(), amounts in amounts()) {
        for amount in amounts {
            let room = ledger.max_amount(resources::SOIL) - ledger.amount(resources::SOIL);
            let stored = ledger.deposit(resources::SOIL, amount);

            prop_assert!(stored >= 0.0);
            prop_assert!(stored <= amount + TOLERANCE);
            prop_assert!(stored <= room + 1e-6);
            prop_assert!(ledger.amount(resources::SOIL) <= ledger.max_amount(resources::SOIL) + 1e-6);
            assert_containers_in_bounds(&ledger)?;
        }
    }

    #[test]
    fn split_requests_match_one_request(ledger in ledger(), parts in amounts()) {
        let mut single = ledger.clone();
        let mut split = ledger;

        let whole = single.request(resources::SNACKS, parts.iter().sum());
        let pieces: f64 = parts.iter().map(|p| split.request(resources::SNACKS, *p)).sum();

        prop_assert!((whole - pieces).abs() < 1e-6, "{whole} vs {pieces}");
        assert_same_contents(&single, &split)?;
    }

    #[test]
    fn split_deposits_match_one_deposit(ledger in ledger(), parts in amounts()) {
        let mut single = ledger.clone();
        let mut split = ledger;

        let whole = single.deposit(resources::SOIL, parts.iter().sum());
        let pieces: f64 = parts.iter().map(|p| split.deposit(resources::SOIL, *p)).sum();

        prop_assert!((whole - pieces).abs() < 1e-6, "{whole} vs {pieces}");
        assert_same_contents(&single, &split)?;
    }

    #[test]
    fn catch_up_matches_one_cycle_at_a_time(
        ledger in ledger(),
        crew in 0_u32..6,
        seconds_per_cycle in 60.0..86_400.0f64,
    ) {
        let context = CrewContext::new(crew, crew);

        let mut batch = snacks_processor(seconds_per_cycle);
        let mut batch_ledger = ledger.clone();
        let batch_cycles = batch.tick(3.0 * seconds_per_cycle, &mut batch_ledger, context);

        let mut stepwise = snacks_processor(seconds_per_cycle);
        let mut step_ledger = ledger;
        let mut step_cycles = Vec::new();
        for _ in 0..3 {
            step_cycles.extend(stepwise.tick(seconds_per_cycle, &mut step_ledger, context));
        }

        prop_assert_eq!(batch_cycles.len(), 3);
        prop_assert_eq!(&batch_cycles, &step_cycles);
        prop_assert_eq!(&batch_ledger, &step_ledger);
        prop_assert_eq!(batch.remaining_time(), stepwise.remaining_time());
    }
}
