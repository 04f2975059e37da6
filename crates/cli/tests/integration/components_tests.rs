use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn test_components_text() {
  let env = TestEnv::new();
  env.write_config(&[], "");

  env
    .platstate_cmd()
    .args(["components", "--verbose"])
    .assert()
    .success()
    .stdout(predicate::str::contains("core__services__svc_a (service) 7"))
    .stdout(predicate::str::contains("core__entities__user (entity) 1.2"))
    .stdout(predicate::str::contains("requires: core__entities__user"));
}

#[test]
fn test_components_json_links_both_directions() {
  let env = TestEnv::new();
  env.write_config(&[], "");

  let output = env.platstate_cmd().args(["components", "-o", "json"]).output().unwrap();
  assert!(output.status.success());
  let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

  assert_eq!(graph["core__services__svc_a"]["mrk"], "service");
  assert_eq!(
    graph["core__services__svc_a"]["requires"],
    serde_json::json!(["core__entities__user"])
  );
  assert_eq!(
    graph["core__entities__user"]["requiredby"],
    serde_json::json!(["core__services__svc_a"])
  );
}

#[test]
fn test_components_definitions_flag() {
  let env = TestEnv::new();

  env
    .platstate_cmd()
    .args(["components", "--definitions"])
    .arg(env.definitions_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Components: 2"));
}

#[test]
fn test_components_missing_playbook_fails() {
  let env = TestEnv::empty();
  env.write_config(&[], "");

  env
    .platstate_cmd()
    .arg("components")
    .assert()
    .failure()
    .stderr(predicate::str::contains("graph construction failed"));
}
