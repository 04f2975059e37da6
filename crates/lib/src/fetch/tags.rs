//! Version tag encoding.
//!
//! Live artifacts are tagged `<build id>_<channel>`. A `-cur` suffix on the
//! channel marks the build that is currently active on that channel:
//!
//! ```text
//! abc123_default-cur   -> channel "default", id "abc123", current
//! def456_default       -> channel "default", id "def456"
//! ```
//!
//! Tags that do not contain exactly one `_` are not version tags and are
//! ignored.

use super::{ChannelObservations, Observation};
use crate::consts::CURRENT_SUFFIX;

/// A decoded version tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag<'a> {
  pub id: &'a str,
  pub channel: &'a str,
  pub current: bool,
}

/// Decode one tag, or `None` when it is not a version tag.
pub fn parse_tag(tag: &str) -> Option<VersionTag<'_>> {
  let (id, rest) = tag.split_once('_')?;
  if rest.contains('_') {
    return None;
  }
  let (channel, current) = match rest.strip_suffix(CURRENT_SUFFIX) {
    Some(channel) => (channel, true),
    None => (rest, false),
  };
  if id.is_empty() || channel.is_empty() {
    return None;
  }
  Some(VersionTag { id, channel, current })
}

/// Group tags into per-channel observations.
///
/// Ids keep their first-seen order and are not repeated. When several tags
/// of a channel carry the current marker, the last one wins.
pub fn parse_tags<I, S>(tags: I) -> ChannelObservations
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut channels = ChannelObservations::new();
  for tag in tags {
    let Some(decoded) = parse_tag(tag.as_ref()) else {
      continue;
    };
    let entry: &mut Observation = channels.entry(decoded.channel.to_string()).or_default();
    if !entry.ids.iter().any(|id| id == decoded.id) {
      entry.ids.push(decoded.id.to_string());
    }
    if decoded.current {
      entry.current = Some(decoded.id.to_string());
    }
  }
  channels
}
