use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn test_history_list_empty() {
  let env = TestEnv::empty();

  env
    .platstate_cmd()
    .args(["history", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No rotated snapshots"));
}

#[test]
fn test_history_keeps_four_most_recent() {
  let env = TestEnv::new();
  env.write_config(&[], "");
  for _ in 0..6 {
    env.sync_json(&[]);
  }

  let output = env.platstate_cmd().args(["history", "list", "-o", "json"]).output().unwrap();
  assert!(output.status.success());
  let entries: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(entries.len(), 4);
  assert!(
    entries
      .iter()
      .all(|e| e["name"].as_str().unwrap().starts_with("state_"))
  );
}

#[test]
fn test_history_show_previous_pass() {
  let env = TestEnv::new();
  env.write_config(&[], "");
  env.sync_json(&[]);
  env.write_config(&["CORE__SERVICES__SVC_A_MRV=7"], "");
  env.sync_json(&[]);

  let output = env.platstate_cmd().args(["history", "list", "-o", "json"]).output().unwrap();
  let entries: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(entries.len(), 1);
  let name = entries[0]["name"].as_str().unwrap().to_string();

  let output = env
    .platstate_cmd()
    .args(["history", "show", &name, "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());
  let previous: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(previous["core__services__svc_a"]["state"]["default"]["fresh"], false);
}

#[test]
fn test_history_show_unknown_fails() {
  let env = TestEnv::empty();

  env
    .platstate_cmd()
    .args(["history", "show", "state_19700101_000000_000000.json"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not found"));
}
