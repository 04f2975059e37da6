//! State reconciliation.
//!
//! Combines the merged live observations with the desired component records
//! and computes, per component and channel, whether the desired version is
//! live and whether a build is needed. Every pass starts from scratch: state
//! from earlier passes is never carried over.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::component::{Component, CurrentVersion, StateRecord};
use crate::fetch::{Observation, ObservationMap};

/// Reconciled components keyed by `mrn`, each carrying its `state`.
pub type StateTable = BTreeMap<String, Component>;

/// Merge source maps in precedence order, host first and registry last.
///
/// The merge is shallow per component: a later source that knows a
/// component replaces that component's entry entirely.
pub fn merge(host: ObservationMap, cluster: ObservationMap, registry: ObservationMap) -> ObservationMap {
  let mut merged = host;
  merged.overlay(cluster);
  merged.overlay(registry);
  merged
}

/// State of one channel given the desired version and what was observed.
pub fn channel_state(desired: &str, observation: Option<&Observation>) -> StateRecord {
  let ids = observation.map(|o| o.ids.clone()).unwrap_or_default();
  let exists = !ids.is_empty();
  let fresh = ids.iter().any(|id| id == desired);

  let mrv_cur = match (observation.and_then(|o| o.current.clone()), ids.as_slice()) {
    (Some(current), _) => Some(CurrentVersion::One(current)),
    (None, []) => None,
    (None, [only]) => Some(CurrentVersion::One(only.clone())),
    (None, many) => Some(CurrentVersion::Many(many.to_vec())),
  };

  StateRecord {
    mrv: ids,
    mrv_cur,
    exists,
    fresh,
    build: !fresh,
  }
}

/// Attach per-channel state to every decodable component record.
///
/// Records that do not decode as a component (for example a missing or
/// mistyped `mrv` or `mrt`) are logged and left out of the table.
pub fn reconcile(records: &BTreeMap<String, serde_json::Value>, observations: &ObservationMap) -> StateTable {
  let mut table = StateTable::new();

  for (key, record) in records {
    let mut component: Component = match serde_json::from_value(record.clone()) {
      Ok(component) => component,
      Err(e) => {
        warn!(component = %key, error = %e, "skipping component");
        continue;
      }
    };

    let observed = observations.get(key);
    component.state = component
      .mrt
      .iter()
      .map(|channel| {
        let observation = observed.and_then(|channels| channels.get(channel));
        (channel.clone(), channel_state(&component.mrv, observation))
      })
      .collect();

    table.insert(key.clone(), component);
  }

  debug!(
    components = table.len(),
    skipped = records.len() - table.len(),
    "reconciled state"
  );
  table
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::component::{ComponentKind, KindSpec};
  use crate::fetch::ChannelObservations;
  use serde_json::json;

  fn observed(key: &str, channel: &str, ids: &[&str]) -> ObservationMap {
    let mut channels = ChannelObservations::new();
    channels.insert(
      channel.to_string(),
      Observation {
        ids: ids.iter().map(|s| s.to_string()).collect(),
        current: None,
      },
    );
    let mut map = ObservationMap::new();
    map.insert(key, channels);
    map
  }

  fn svc_a() -> BTreeMap<String, serde_json::Value> {
    let mut component = Component::new("core__services__svc_a", KindSpec::empty(ComponentKind::Service));
    component.mrv = "7".to_string();
    BTreeMap::from([(
      component.mrn.clone(),
      serde_json::to_value(&component).unwrap(),
    )])
  }

  mod merging {
    use super::*;

    #[test]
    fn later_source_replaces_component_entry() {
      let merged = merge(
        observed("x", "default", &["v1"]),
        observed("x", "default", &["v2"]),
        ObservationMap::new(),
      );
      assert_eq!(merged, observed("x", "default", &["v2"]));
    }

    #[test]
    fn registry_drops_cluster_channels_for_same_component() {
      let mut cluster = observed("x", "default", &["v1"]);
      cluster.overlay_channels(observed("x", "canary", &["c1"]));
      let merged = merge(ObservationMap::new(), cluster, observed("x", "default", &["v3"]));
      assert!(merged.channel("x", "canary").is_none());
    }
  }

  mod channel {
    use super::*;

    #[test]
    fn nothing_observed_needs_build() {
      let state = channel_state("7", None);
      assert!(!state.exists);
      assert!(!state.fresh);
      assert!(state.build);
      assert!(state.mrv_cur.is_none());
    }

    #[test]
    fn fresh_when_desired_is_among_ids() {
      let observation = Observation {
        ids: vec!["6".to_string(), "7".to_string()],
        current: Some("6".to_string()),
      };
      let state = channel_state("7", Some(&observation));
      assert!(state.exists);
      assert!(state.fresh);
      assert!(!state.build);
      assert_eq!(state.mrv_cur, Some(CurrentVersion::One("6".to_string())));
    }

    #[test]
    fn several_unmarked_ids_are_listed() {
      let observation = Observation {
        ids: vec!["1".to_string(), "2".to_string()],
        current: None,
      };
      let state = channel_state("3", Some(&observation));
      assert!(state.exists);
      assert!(state.build);
      assert_eq!(
        state.mrv_cur,
        Some(CurrentVersion::Many(vec!["1".to_string(), "2".to_string()]))
      );
    }

    #[test]
    fn empty_ids_do_not_exist() {
      let state = channel_state("1", Some(&Observation::default()));
      assert!(!state.exists);
      assert!(state.build);
    }
  }

  mod reconciling {
    use super::*;

    #[test]
    fn svc_a_across_two_passes() {
      let records = svc_a();

      let first = reconcile(&records, &ObservationMap::new());
      let state = &first["core__services__svc_a"].state["default"];
      assert_eq!((state.exists, state.fresh, state.build), (false, false, true));

      let second = reconcile(&records, &observed("core__services__svc_a", "default", &["7"]));
      let state = &second["core__services__svc_a"].state["default"];
      assert_eq!((state.exists, state.fresh, state.build), (true, true, false));
      assert_eq!(state.mrv_cur, Some(CurrentVersion::One("7".to_string())));
    }

    #[test]
    fn state_covers_every_declared_channel() {
      let mut records = svc_a();
      if let Some(record) = records.get_mut("core__services__svc_a") {
        record["mrt"] = json!(["default", "canary"]);
      }
      let table = reconcile(&records, &observed("core__services__svc_a", "canary", &["7"]));
      let state = &table["core__services__svc_a"].state;
      assert_eq!(state.len(), 2);
      assert!(state["canary"].fresh);
      assert!(!state["default"].exists);
    }

    #[test]
    fn previous_state_is_discarded() {
      let mut records = svc_a();
      if let Some(record) = records.get_mut("core__services__svc_a") {
        record["state"] = json!({"stale": {"mrv": ["1"], "exists": true, "fresh": true, "build": false}});
      }
      let table = reconcile(&records, &ObservationMap::new());
      assert!(!table["core__services__svc_a"].state.contains_key("stale"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn undecodable_record_is_skipped() {
      let mut records = svc_a();
      records.insert("broken".to_string(), json!({"mrn": "broken", "mrk": "service"}));

      let table = reconcile(&records, &ObservationMap::new());
      assert_eq!(table.len(), 1);
      assert!(!table.contains_key("broken"));
      assert!(logs_contain("skipping component"));
    }
  }
}
