//! End-to-end runs of the orchestrator against a scripted runner.

mod common;

use std::fs;
use std::time::Duration;

use tempfile::TempDir;

use perf_collector::collectors::target::TargetProcess;
use perf_collector::config::{FailurePolicy, IdentityConfig};
use perf_collector::error::{exit_code_for, CollectError};
use perf_collector::models::{TaskKind, TaskStatus};
use perf_collector::run::Collection;

use common::{archives_in, config_in, zip_entries, zip_read, FakeRunner};

fn running_target(name: &str) -> Option<TargetProcess> {
    Some(TargetProcess { name: name.to_string(), pid: 4242 })
}

#[test]
fn test_full_run_produces_one_archive() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new();

    let outcome = Collection::new(&runner, config_in(temp_dir.path()), Duration::from_secs(1))
        .with_target_finder(running_target)
        .run();

    let report = outcome.collection.unwrap();
    assert_eq!(report.execution.failure_count(), 0);
    assert!(report.execution.outcomes.iter().all(|o| o.status == TaskStatus::Succeeded));

    let archive = outcome.archive.unwrap();
    assert_eq!(archives_in(&temp_dir.path().join("out")), vec![archive.clone()]);

    let entries = zip_entries(&archive);
    for expected in [
        "perf-stat.txt",
        "perf-exec.data",
        "perf-system.data",
        "perf-target.data",
        "perf-target-report.txt",
        "collection_summary.json",
        "uname.txt",
        "ps.txt",
    ] {
        assert!(entries.contains(&expected.to_string()), "missing {} in {:?}", expected, entries);
    }
    // Tools the host lacks are skipped, not recorded as failures
    assert!(!entries.contains(&"lsof.txt".to_string()));
}

#[test]
fn test_task_failure_still_yields_exactly_one_archive() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new().failing_when(|cmd| {
        cmd.args.first().map(String::as_str) == Some("record")
            && cmd.args.iter().any(|a| a.ends_with("perf-system.data"))
    });

    let outcome = Collection::new(&runner, config_in(temp_dir.path()), Duration::from_secs(1))
        .with_target_finder(running_target)
        .run();

    let report = outcome.collection.unwrap();
    assert_eq!(report.execution.failure_count(), 1);
    let system = report
        .execution
        .outcomes
        .iter()
        .find(|o| o.kind == TaskKind::SystemCallGraph)
        .unwrap();
    assert!(matches!(&system.status, TaskStatus::Failed(reason) if reason.contains("exit status 1")));

    // Later tasks still ran
    assert_eq!(runner.perf_commands("record").len(), 3);

    let archives = archives_in(&temp_dir.path().join("out"));
    assert_eq!(archives.len(), 1);
    let errors = zip_read(&archives[0], "collection-errors.txt");
    assert!(errors.contains("system-call-graph"));
}

#[test]
fn test_abort_policy_stops_but_archives() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new().failing_when(|cmd| cmd.args.first().map(String::as_str) == Some("stat"));

    let mut config = config_in(temp_dir.path());
    config.failure_policy = FailurePolicy::Abort;

    let outcome = Collection::new(&runner, config, Duration::from_secs(1))
        .with_target_finder(running_target)
        .run();

    let err = outcome.collection.unwrap_err();
    assert!(matches!(err.downcast_ref::<CollectError>(), Some(CollectError::TaskFailed { .. })));
    assert_eq!(exit_code_for(&err), 2);

    // Nothing after the failed counters task was recorded
    assert!(runner.perf_commands("record").is_empty());

    let archive = outcome.archive.unwrap();
    assert_eq!(archives_in(&temp_dir.path().join("out")).len(), 1);
    let entries = zip_entries(&archive);
    assert!(entries.contains(&"collection-errors.txt".to_string()));
    assert!(entries.contains(&"collection_summary.json".to_string()));
}

#[test]
fn test_abort_summary_keeps_completed_tasks() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new().failing_when(|cmd| {
        cmd.args.first().map(String::as_str) == Some("record")
            && cmd.args.iter().any(|a| a.ends_with("perf-system.data"))
    });

    let mut config = config_in(temp_dir.path());
    config.failure_policy = FailurePolicy::Abort;

    let outcome = Collection::new(&runner, config, Duration::from_secs(1))
        .with_target_finder(running_target)
        .run();
    assert!(outcome.collection.is_err());

    let archive = outcome.archive.unwrap();
    let summary: serde_json::Value =
        serde_json::from_str(&zip_read(&archive, "collection_summary.json")).unwrap();
    let tasks = summary["tasks"].as_array().unwrap();

    let statuses: Vec<(&str, &str)> = tasks
        .iter()
        .map(|t| (t["kind"].as_str().unwrap(), t["status"].as_str().unwrap()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("counters", "succeeded"),
            ("exec_trace", "succeeded"),
            ("system_call_graph", "failed"),
        ]
    );
    // The target recording never started
    assert!(!runner.perf_commands("record").iter().any(|c| c.args.contains(&"-p".to_string())));
}

#[test]
fn test_stale_working_directory_is_replaced() {
    let temp_dir = TempDir::new().unwrap();
    let work = temp_dir.path().join("work");
    fs::create_dir_all(work.join("leftovers")).unwrap();
    fs::write(work.join("leftovers/old-perf.data"), b"stale").unwrap();
    fs::write(work.join("perf-stat.txt"), b"stale counters").unwrap();

    let runner = FakeRunner::new();
    let outcome = Collection::new(&runner, config_in(temp_dir.path()), Duration::from_secs(1))
        .with_target_finder(|_| None)
        .run();

    assert!(outcome.collection.is_ok());
    assert!(!work.join("leftovers").exists());

    let archive = outcome.archive.unwrap();
    let entries = zip_entries(&archive);
    assert!(!entries.iter().any(|e| e.starts_with("leftovers")));
    assert!(!zip_read(&archive, "perf-stat.txt").contains("stale"));
}

#[test]
fn test_target_not_running_produces_placeholder() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new();

    let outcome = Collection::new(&runner, config_in(temp_dir.path()), Duration::from_secs(1))
        .with_target_finder(|_| None)
        .run();

    let report = outcome.collection.unwrap();
    let target = report
        .execution
        .outcomes
        .iter()
        .find(|o| o.kind == TaskKind::TargetCallGraph)
        .unwrap();
    assert!(matches!(&target.status, TaskStatus::Placeholder(_)));
    assert!(!runner.perf_commands("record").iter().any(|c| c.args.contains(&"-p".to_string())));

    let archive = outcome.archive.unwrap();
    assert!(zip_read(&archive, "perf-target-report.txt").contains("not running"));
}

#[test]
fn test_unavailable_identity_names_archive_unset() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new();

    let mut config = config_in(temp_dir.path());
    config.identity = IdentityConfig {
        query_command: Some(vec!["/opt/agent/missing-ctl".into()]),
        ..IdentityConfig::default()
    };

    let outcome = Collection::new(&runner, config, Duration::from_secs(1))
        .with_target_finder(|_| None)
        .run();

    let archive = outcome.archive.unwrap();
    let name = archive.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("perf-unset-unset-"), "unexpected name {}", name);
}

#[test]
fn test_queried_identity_names_archive() {
    let temp_dir = TempDir::new().unwrap();
    let mut runner = FakeRunner::new();
    runner.identity_output = Some("cid=\"c0ffee\", aid=\"beef\"\n".to_string());

    let mut config = config_in(temp_dir.path());
    config.identity.query_command = Some(vec!["/opt/agent/ctl".into(), "-g".into()]);

    let outcome = Collection::new(&runner, config, Duration::from_secs(1))
        .with_target_finder(|_| None)
        .run();

    let name = outcome.archive.unwrap().file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("perf-c0ffee-beef-"), "unexpected name {}", name);
}

#[test]
fn test_duration_is_passed_to_every_timed_task() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new();

    let outcome = Collection::new(&runner, config_in(temp_dir.path()), Duration::from_secs(10))
        .with_target_finder(running_target)
        .run();
    assert!(outcome.collection.is_ok());

    let timed: Vec<_> = runner
        .perf_commands("stat")
        .into_iter()
        .chain(runner.perf_commands("record"))
        .collect();
    assert_eq!(timed.len(), 4);
    for cmd in timed {
        assert!(cmd.args.ends_with(&["--".to_string(), "sleep".to_string(), "10".to_string()]), "{}", cmd);
    }
}

#[test]
fn test_unusable_listing_still_collects() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::new().without_listing();

    let outcome = Collection::new(&runner, config_in(temp_dir.path()), Duration::from_secs(1))
        .with_target_finder(|_| None)
        .run();

    let report = outcome.collection.unwrap();
    assert!(report.capabilities.is_empty());

    let stat = runner.perf_commands("stat");
    assert_eq!(stat.len(), 1);
    assert!(!stat[0].args.contains(&"-e".to_string()));

    // Only the system-wide call graph is recorded
    let record = runner.perf_commands("record");
    assert_eq!(record.len(), 1);
    assert!(record[0].args.iter().any(|a| a.ends_with("perf-system.data")));

    let archive = outcome.archive.unwrap();
    assert!(zip_read(&archive, "perf-exec-report.txt").contains("not available"));
}
