use std::{num::NonZeroUsize, path::Path, time::Duration};

use pageowner_migration::{
    AbortReason, MigrationError, MigrationPlan, Mutator, Orchestrator, OwnerFilter, RunOutcome,
    RunSummary, ScanConfig, Scanner, Scope,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

mod common;

use common::{InMemoryPageStore, ScriptedOperator, page};

const OLD: &str = "abc123";
const NEW: &str = "xyz789";

fn plan(dir: &TempDir, scope: Scope) -> MigrationPlan {
    let mut plan = MigrationPlan::new(OLD, NEW, scope);
    plan.scan = ScanConfig {
        page_limit: NonZeroUsize::new(2).unwrap(),
        ..Default::default()
    };
    plan.request_delay = Duration::ZERO;
    plan.backup_path = dir.path().join("pages_backup.json");
    plan.results_path = dir.path().join("update_results.json");
    plan
}

/// Three pages owned by [`OLD`], two on the first result page and one on the second
fn three_matches_over_two_pages() -> InMemoryPageStore {
    InMemoryPageStore::new([
        page("1", OLD, "10"),
        page("2", OLD, "10"),
        page("3", "someone-else", "10"),
        page("4", OLD, "20"),
    ])
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn completed(outcome: RunOutcome) -> RunSummary {
    match outcome {
        RunOutcome::Completed(summary) => summary,
        other => panic!("run should complete: {other:?}"),
    }
}

async fn run(
    store: &InMemoryPageStore,
    plan: &MigrationPlan,
    operator: &mut ScriptedOperator,
) -> Result<RunOutcome, MigrationError> {
    Orchestrator::new(store, plan, operator).run().await
}

#[tokio::test]
async fn all_matches_are_reassigned() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    let plan = plan(&dir, Scope::AllSpaces);
    let mut operator = ScriptedOperator::new(["y"]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    let summary = completed(outcome);
    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failure_count, 0);
    assert_eq!(summary.confirmed, vec!["1", "2", "4"]);
    assert!(summary.unconfirmed_pages.is_empty());

    for id in ["1", "2", "4"] {
        let page = store.page(id);
        assert_eq!(page.owner_id.as_deref(), Some(NEW));
        assert_eq!(page.version.number, 2);
    }
    assert_eq!(store.page("3").owner_id.as_deref(), Some("someone-else"));
    assert_eq!(store.writes(), vec!["1", "2", "4"]);
    // one read before each write, one read to verify each success
    assert_eq!(store.reads(), 6);

    let backup = read_json(&plan.backup_path);
    assert_eq!(backup["complete"], true);
    assert_eq!(backup["source_owner"], OLD);
    let backed_up: Vec<_> = backup["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["id"].as_str().unwrap(), p["ownerId"].as_str().unwrap()))
        .collect();
    assert_eq!(backed_up, vec![("1", OLD), ("2", OLD), ("4", OLD)]);

    let results = read_json(&plan.results_path);
    assert_eq!(results["success_count"], 3);
    assert_eq!(results["failure_count"], 0);
    assert_eq!(
        results["updated_pages"],
        serde_json::json!(["1", "2", "4"])
    );

    assert_eq!(
        operator.questions,
        vec![format!(
            "\nDo you want to update all 3 pages to the new owner {NEW}? (y/n): "
        )]
    );
    assert!(operator.said("Updating 1/3: Page 1 (1)... SUCCESS"));
    assert!(operator.said("Updating 3/3: Page 4 (4)... SUCCESS"));
}

#[tokio::test]
async fn conflicting_write_is_counted_and_not_confirmed() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    store.conflict_on("2");
    let plan = plan(&dir, Scope::AllSpaces);
    let mut operator = ScriptedOperator::new(["y"]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    let summary = completed(outcome);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.confirmed, vec!["1", "4"]);
    assert_eq!(summary.failed_pages.len(), 1);
    assert_eq!(summary.failed_pages[0].id, "2");
    assert!(
        summary.failed_pages[0].error.contains("Version must be incremented"),
        "{}",
        summary.failed_pages[0].error
    );

    // the batch went on after the conflict
    assert_eq!(store.writes(), vec!["1", "2", "4"]);
    let unchanged = store.page("2");
    assert_eq!(unchanged.owner_id.as_deref(), Some(OLD));
    assert_eq!(unchanged.version.number, 1);
    assert!(operator.said("Updating 2/3: Page 2 (2)... FAILED"));

    let results = read_json(&plan.results_path);
    assert_eq!(results["updated_pages"], serde_json::json!(["1", "4"]));
    assert_eq!(results["failed_pages"][0]["id"], "2");
}

#[tokio::test]
async fn declining_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    let plan = plan(&dir, Scope::AllSpaces);
    let mut operator = ScriptedOperator::new(["n"]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    assert_eq!(outcome, RunOutcome::Aborted(AbortReason::Declined));
    assert!(store.writes().is_empty());
    assert_eq!(store.reads(), 0);
    assert!(!plan.backup_path.exists());
    assert!(!plan.results_path.exists());
    assert!(operator.said("Update operation cancelled."));
}

#[tokio::test]
async fn anything_but_yes_declines() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    let plan = plan(&dir, Scope::AllSpaces);
    // no answer at all, as on a closed stdin
    let mut operator = ScriptedOperator::new([]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    assert_eq!(outcome, RunOutcome::Aborted(AbortReason::Declined));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn unknown_space_keys_exhaust_retries() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages().with_space("98304", "OPS");
    let plan = plan(
        &dir,
        Scope::Space {
            key: "NOPE".into(),
        },
    );
    let mut operator = ScriptedOperator::new(["y", "STILL-NOPE", "y", "  "]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Aborted(AbortReason::SpaceNotFound { attempts: 3 })
    );
    assert_eq!(store.list_calls(), 0);
    assert!(store.writes().is_empty());
    assert!(!plan.backup_path.exists());
    assert!(operator.said("Space with key 'NOPE' not found"));
    assert!(operator.said("Space with key 'STILL-NOPE' not found"));
    assert!(operator.said("The space key must not be empty"));
    assert!(operator.said("Operation cancelled."));
}

#[tokio::test]
async fn operator_can_stop_retrying_space_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    let plan = plan(
        &dir,
        Scope::Space {
            key: "NOPE".into(),
        },
    );
    let mut operator = ScriptedOperator::new(["n"]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Aborted(AbortReason::SpaceNotFound { attempts: 1 })
    );
    assert_eq!(
        operator.questions,
        vec!["Do you want to try a different space key? (y/n): "]
    );
}

#[tokio::test]
async fn space_found_on_retry_scopes_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages().with_space("10", "OPS");
    let plan = plan(
        &dir,
        Scope::Space {
            key: "OSP".into(),
        },
    );
    let mut operator = ScriptedOperator::new(["y", "OPS", "y"]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    let summary = completed(outcome);
    assert_eq!(summary.confirmed, vec!["1", "2"]);
    assert_eq!(store.page("4").owner_id.as_deref(), Some(OLD));
    assert!(operator.said("Found space ID: 10 for space key: OPS"));

    let backup = read_json(&plan.backup_path);
    assert_eq!(backup["space_id"], "10");
}

#[tokio::test]
async fn snapshot_failure_prevents_all_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    let mut plan = plan(&dir, Scope::AllSpaces);
    plan.backup_path = dir.path().join("missing").join("pages_backup.json");
    let mut operator = ScriptedOperator::new(["y"]);

    let err = run(&store, &plan, &mut operator).await.unwrap_err();

    assert!(matches!(err, MigrationError::Snapshot(_)), "{err}");
    assert!(store.writes().is_empty());
    assert!(!plan.results_path.exists());
}

#[tokio::test]
async fn results_failure_keeps_applied_changes() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    let mut plan = plan(&dir, Scope::AllSpaces);
    plan.results_path = dir.path().join("missing").join("update_results.json");
    let mut operator = ScriptedOperator::new(["y"]);

    let err = run(&store, &plan, &mut operator).await.unwrap_err();

    assert!(matches!(err, MigrationError::Results(_)), "{err}");
    assert_eq!(store.writes(), vec!["1", "2", "4"]);
    for id in ["1", "2", "4"] {
        assert_eq!(store.page(id).owner_id.as_deref(), Some(NEW));
    }
    assert!(plan.backup_path.exists());
    assert!(operator.said("Successfully updated: 3 pages"));
}

#[tokio::test]
async fn space_lookup_failure_ends_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages().with_space("10", "OPS");
    store.fail_space_lookup();
    let plan = plan(&dir, Scope::Space { key: "OPS".into() });
    let mut operator = ScriptedOperator::new(["y"]);

    let err = run(&store, &plan, &mut operator).await.unwrap_err();

    assert!(matches!(err, MigrationError::Locate(_)), "{err}");
    assert!(err.to_string().contains("Unauthorized"), "{err}");
    assert_eq!(store.list_calls(), 0);
    assert!(operator.questions.is_empty());
    assert!(store.writes().is_empty());
    assert!(!plan.backup_path.exists());
}

#[tokio::test]
async fn truncated_scan_aborts_before_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    store.fail_list_call(1);
    let plan = plan(&dir, Scope::AllSpaces);
    let mut operator = ScriptedOperator::new(["y"]);

    let err = run(&store, &plan, &mut operator).await.unwrap_err();

    match err {
        MigrationError::ScanTruncated {
            pages_fetched,
            matched,
            ..
        } => {
            assert_eq!(pages_fetched, 1);
            assert_eq!(matched, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(operator.questions.is_empty());
    assert!(store.writes().is_empty());
    assert!(!plan.backup_path.exists());
}

#[tokio::test]
async fn partial_scan_can_be_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let store = three_matches_over_two_pages();
    store.fail_list_call(1);
    let mut plan = plan(&dir, Scope::AllSpaces);
    plan.allow_partial_scan = true;
    let mut operator = ScriptedOperator::new(["y"]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    let summary = completed(outcome);
    assert_eq!(summary.confirmed, vec!["1", "2"]);
    assert!(operator.said("WARNING: the page scan stopped"));
    assert_eq!(read_json(&plan.backup_path)["complete"], false);
    assert_eq!(store.page("4").owner_id.as_deref(), Some(OLD));
}

#[tokio::test]
async fn no_matches_means_no_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryPageStore::new([page("1", "someone-else", "10")]);
    let plan = plan(&dir, Scope::AllSpaces);
    let mut operator = ScriptedOperator::new(["y"]);

    let outcome = run(&store, &plan, &mut operator).await.unwrap();

    assert_eq!(outcome, RunOutcome::Aborted(AbortReason::NothingToDo));
    assert!(operator.questions.is_empty());
    assert!(!plan.backup_path.exists());
}

#[tokio::test]
async fn reassigning_twice_bumps_the_version_each_time() {
    let store = InMemoryPageStore::new([page("1", OLD, "10")]);
    let mutator = Mutator::new(&store, NEW);

    let first = mutator.reassign("1").await;
    let second = mutator.reassign("1").await;

    assert_eq!(first.result, Ok(2));
    assert_eq!(second.result, Ok(3));
    assert_eq!(store.page("1").version.number, 3);
    assert_eq!(store.page("1").owner_id.as_deref(), Some(NEW));
}

#[tokio::test]
async fn scan_keeps_discovery_order_across_pages() {
    let store = InMemoryPageStore::new([
        page("9", OLD, "10"),
        page("3", "someone-else", "10"),
        page("7", OLD, "20"),
        page("1", OLD, "10"),
        page("5", OLD, "10"),
    ]);
    let config = ScanConfig {
        page_limit: NonZeroUsize::new(2).unwrap(),
        ..Default::default()
    };

    let outcome = Scanner::new(config)
        .scan(&store, &OwnerFilter::new(OLD))
        .await
        .unwrap();

    let ids: Vec<_> = outcome.pages.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["9", "7", "1", "5"]);
    assert_eq!(outcome.pages_fetched, 3);
    assert!(outcome.is_complete());
}
