//! platstate-lib: staleness tracking for platform components
//!
//! This crate decides, per component and deployment channel, whether the
//! version declared in the definition tree is already live:
//! - `graph`: builds the component dependency graph from definition files
//! - `fetch`: reads live versions from the host, the cluster and the image registry
//! - `state`: merges observations and reconciles them against desired versions
//! - `snapshot`: persists the state table with a bounded history
//! - `pipeline`: runs one pass end to end

pub mod component;
pub mod config;
pub mod consts;
pub mod fetch;
pub mod graph;
pub mod paths;
pub mod pipeline;
pub mod snapshot;
pub mod state;
pub mod util;
