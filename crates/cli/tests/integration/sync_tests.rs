use mockito::{Matcher, Server};
use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn test_sync_without_sources_needs_builds() {
  let env = TestEnv::new();
  env.write_config(&[], "");

  let table = env.sync_json(&[]);
  let svc = &table["core__services__svc_a"]["state"]["default"];
  assert_eq!(svc["exists"], false);
  assert_eq!(svc["fresh"], false);
  assert_eq!(svc["build"], true);
  assert!(env.snapshot_path().exists());
  assert!(env.history_path().join("merged_data.json").exists());
}

#[test]
fn test_sync_host_version_is_fresh() {
  let env = TestEnv::new();
  env.write_config(&["CORE__SERVICES__SVC_A_MRV=7"], "");

  let table = env.sync_json(&[]);
  let svc = &table["core__services__svc_a"]["state"]["default"];
  assert_eq!(svc["fresh"], true);
  assert_eq!(svc["mrv_cur"], "7");
  assert_eq!(table["core__entities__user"]["state"]["default"]["build"], true);
}

#[test]
fn test_sync_text_summary() {
  let env = TestEnv::new();
  env.write_config(&["CORE__SERVICES__SVC_A_MRV=7"], "");

  env
    .platstate_cmd()
    .arg("sync")
    .assert()
    .success()
    .stdout(predicate::str::contains("core__entities__user"))
    .stdout(predicate::str::contains("Needs build: 1"))
    .stdout(predicate::str::contains("Sync complete"));
}

#[test]
fn test_sync_reads_registry() {
  let mut server = Server::new();
  server
    .mock("GET", "/v2/_catalog")
    .match_query(Matcher::Any)
    .with_body(r#"{"repositories": ["core/entities/user"]}"#)
    .create();
  server
    .mock("GET", "/v2/core/entities/user/tags/list")
    .with_body(r#"{"name": "core/entities/user", "tags": ["1.1_default", "1.2_default-cur"]}"#)
    .create();

  let env = TestEnv::new();
  env.write_config(&[], "");

  let table = env.sync_json(&["--registry", &server.url()]);
  let user = &table["core__entities__user"]["state"]["default"];
  assert_eq!(user["fresh"], true);
  assert_eq!(user["mrv_cur"], "1.2");
  assert_eq!(user["mrv"], serde_json::json!(["1.1", "1.2"]));
}

#[test]
fn test_sync_registry_failure_names_fetch_stage() {
  let mut server = Server::new();
  server
    .mock("GET", "/v2/_catalog")
    .match_query(Matcher::Any)
    .with_status(500)
    .with_body("internal error")
    .create();

  let env = TestEnv::new();
  env.write_config(&["CORE__SERVICES__SVC_A_MRV=7"], "");

  env
    .platstate_cmd()
    .args(["sync", "--registry", &server.url()])
    .assert()
    .failure()
    .stderr(predicate::str::contains("fetch stage failed"));

  let partial: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(env.snapshot_path()).unwrap()).unwrap();
  assert_eq!(partial["core__services__svc_a"]["state"]["default"]["fresh"], true);
}

#[test]
fn test_sync_missing_role_names_graph_stage() {
  let env = TestEnv::new();
  env.write_file("defs/platform.yaml", "- name: edge\n  roles:\n    - core.services.missing\n");
  env.write_config(&[], "");

  env
    .platstate_cmd()
    .arg("sync")
    .assert()
    .failure()
    .stderr(predicate::str::contains("graph construction stage failed"));
  assert!(!env.snapshot_path().exists());
}

#[test]
fn test_sync_from_component_records() {
  let env = TestEnv::empty();
  env.write_config(&["CORE__SERVICES__SVC_B_MRV=3"], "channel: canary\n");
  env.write_file(
    "components.json",
    r#"{
  "core__services__svc_b": {
    "mrn": "core__services__svc_b",
    "mrsn": "svc-b",
    "mrns": "core",
    "mrl": "svc://edge/svc-b",
    "mrc": "edge.svc-b",
    "mrk": "service",
    "mrv": "3",
    "mrt": ["canary"]
  },
  "broken": {"mrn": "broken", "mrk": "service"}
}"#,
  );
  let records = env.temp.path().join("components.json");

  let table = env.sync_json(&["--components", records.to_str().unwrap()]);
  assert_eq!(table["core__services__svc_b"]["state"]["canary"]["fresh"], true);
  assert!(table.get("broken").is_none());
}

#[test]
fn test_sync_channel_flag_overrides_config() {
  let env = TestEnv::new();
  env.write_config(&["CORE__SERVICES__SVC_A_MRV=7"], "channel: stable\n");

  let table = env.sync_json(&["--channel", "default"]);
  assert_eq!(table["core__services__svc_a"]["state"]["default"]["fresh"], true);
}
