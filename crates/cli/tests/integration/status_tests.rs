use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn test_status_without_snapshot() {
  let env = TestEnv::empty();

  env
    .platstate_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("No snapshot found"));
}

#[test]
fn test_status_after_sync() {
  let env = TestEnv::new();
  env.write_config(&["CORE__SERVICES__SVC_A_MRV=7"], "");
  env.sync_json(&[]);

  env
    .platstate_cmd()
    .args(["status", "--verbose"])
    .assert()
    .success()
    .stdout(predicate::str::contains("core__services__svc_a [default] 7"))
    .stdout(predicate::str::contains("Components: 2"));
}

#[test]
fn test_status_json_matches_sync() {
  let env = TestEnv::new();
  env.write_config(&[], "");
  let synced = env.sync_json(&[]);

  let output = env.platstate_cmd().args(["status", "-o", "json"]).output().unwrap();
  assert!(output.status.success());
  let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(status, synced);
}

#[test]
fn test_status_corrupt_snapshot_fails() {
  let env = TestEnv::empty();
  env.write_file("data/platstate/state.json", "{not json");

  env
    .platstate_cmd()
    .arg("status")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Error loading snapshot"));
}
