//! Artifact registry fetcher.
//!
//! Reads the registry catalog page by page, then fetches the tag list of
//! every repository through a fixed pool of workers fed from a bounded
//! queue. Results are aggregated on the calling task once all workers have
//! finished. Any HTTP failure, registry error body or timeout aborts the
//! whole fetch.
//!
//! When a [`LocalImageLister`] is attached, the node's image cache forms the
//! base map and registry results override it channel by channel.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, LINK};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::local::LocalImageLister;
use super::tags::parse_tags;
use super::{FetchError, ObservationMap, VersionFetcher};
use crate::component::repository_key;
use crate::consts::{DEFAULT_CATALOG_PAGE_SIZE, MAX_REGISTRY_WORKERS, REGISTRY_TIMEOUT};

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("invalid registry endpoint '{endpoint}': {message}")]
  InvalidEndpoint { endpoint: String, message: String },

  #[error("failed to create HTTP client: {0}")]
  Client(String),

  #[error("request to {url} failed: {message}")]
  Transport { url: String, message: String },

  #[error("request to {url} timed out")]
  Timeout { url: String },

  #[error("{url} returned status {status}: {body}")]
  Status { url: String, status: u16, body: String },

  #[error("{url} reported errors: {errors}")]
  Protocol { url: String, errors: String },

  #[error("failed to decode response from {url}: {message}")]
  Decode { url: String, message: String },

  #[error("registry worker failed: {0}")]
  Worker(String),
}

/// Location of a registry.
///
/// A bare `host[:port]` is reached over HTTPS; an explicit `http://` or
/// `https://` scheme is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
  base: Url,
  host: String,
}

impl RegistryEndpoint {
  pub fn parse(endpoint: &str) -> Result<Self, RegistryError> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let (with_scheme, host) = match trimmed.split_once("://") {
      Some((_, host)) => (trimmed.to_string(), host.to_string()),
      None => (format!("https://{trimmed}"), trimmed.to_string()),
    };
    let base = Url::parse(&format!("{with_scheme}/")).map_err(|e| RegistryError::InvalidEndpoint {
      endpoint: endpoint.to_string(),
      message: e.to_string(),
    })?;
    if host.is_empty() || base.host_str().is_none() {
      return Err(RegistryError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: "missing host".to_string(),
      });
    }
    Ok(Self { base, host })
  }

  /// `host[:port][/path]` without scheme, as it prefixes image names.
  pub fn host(&self) -> &str {
    &self.host
  }

  fn join(&self, path: &str) -> Result<Url, RegistryError> {
    self.base.join(path).map_err(|e| RegistryError::InvalidEndpoint {
      endpoint: self.base.to_string(),
      message: e.to_string(),
    })
  }
}

#[derive(Debug, Deserialize)]
struct Catalog {
  #[serde(default)]
  repositories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TagList {
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  errors: Option<serde_json::Value>,
}

/// Issues authenticated requests; cheap to clone into workers.
#[derive(Debug, Clone)]
struct Requester {
  client: Client,
  endpoint: RegistryEndpoint,
  auth: Option<String>,
}

impl Requester {
  /// GET `url` and decode its JSON body, returning the `Link` target if any.
  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<(T, Option<Url>), RegistryError> {
    let display = url.to_string();
    let mut request = self.client.get(url);
    if let Some(auth) = &self.auth {
      request = request.header(AUTHORIZATION, format!("Basic {auth}"));
    }

    let response = request.send().await.map_err(|e| transport_error(&display, e))?;
    let status = response.status();
    let next = response
      .headers()
      .get(LINK)
      .and_then(|value| value.to_str().ok())
      .and_then(parse_next_link)
      .map(|link| self.endpoint.join(&link))
      .transpose()?;
    let body = response.text().await.map_err(|e| transport_error(&display, e))?;

    if !status.is_success() {
      return Err(RegistryError::Status {
        url: display,
        status: status.as_u16(),
        body: body.trim().to_string(),
      });
    }
    if let Ok(ErrorBody { errors: Some(errors) }) = serde_json::from_str::<ErrorBody>(&body)
      && !errors.is_null()
    {
      return Err(RegistryError::Protocol {
        url: display,
        errors: errors.to_string(),
      });
    }

    let value = serde_json::from_str(&body).map_err(|e| RegistryError::Decode {
      url: display,
      message: e.to_string(),
    })?;
    Ok((value, next))
  }

  async fn tags(&self, repository: &str) -> Result<(String, Vec<String>), RegistryError> {
    let url = self.endpoint.join(&format!("v2/{repository}/tags/list"))?;
    let (list, _): (TagList, _) = self.get_json(url).await?;
    let name = list.name.unwrap_or_else(|| repository.to_string());
    Ok((name, list.tags.unwrap_or_default()))
  }
}

fn transport_error(url: &str, e: reqwest::Error) -> RegistryError {
  if e.is_timeout() {
    RegistryError::Timeout { url: url.to_string() }
  } else {
    RegistryError::Transport {
      url: url.to_string(),
      message: e.to_string(),
    }
  }
}

/// Extract the target of a `Link: <...>; rel="next"` header.
fn parse_next_link(header: &str) -> Option<String> {
  header
    .split(',')
    .find(|part| part.contains("rel=\"next\"") || part.contains("rel=next"))
    .and_then(|part| {
      let start = part.find('<')? + 1;
      let end = part[start..].find('>')? + start;
      Some(part[start..end].to_string())
    })
}

#[derive(Debug, Clone)]
pub struct RegistryFetcher {
  requester: Requester,
  page_size: usize,
  concurrency: usize,
  local: Option<LocalImageLister>,
}

impl RegistryFetcher {
  /// A fetcher for `endpoint`, authenticating with a pre-encoded Basic
  /// credential when one is given.
  pub fn new(endpoint: RegistryEndpoint, auth: Option<String>) -> Result<Self, RegistryError> {
    Self::with_timeout(endpoint, auth, REGISTRY_TIMEOUT)
  }

  pub fn with_timeout(
    endpoint: RegistryEndpoint,
    auth: Option<String>,
    timeout: Duration,
  ) -> Result<Self, RegistryError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| RegistryError::Client(e.to_string()))?;
    Ok(Self {
      requester: Requester {
        client,
        endpoint,
        auth,
      },
      page_size: DEFAULT_CATALOG_PAGE_SIZE,
      concurrency: MAX_REGISTRY_WORKERS,
      local: None,
    })
  }

  pub fn page_size(mut self, page_size: usize) -> Self {
    self.page_size = page_size.max(1);
    self
  }

  /// Cap on concurrent tag-list requests; never above the global ceiling.
  pub fn concurrency(mut self, workers: usize) -> Self {
    self.concurrency = workers.clamp(1, MAX_REGISTRY_WORKERS);
    self
  }

  pub fn with_local(mut self, lister: LocalImageLister) -> Self {
    self.local = Some(lister);
    self
  }

  pub fn endpoint(&self) -> &RegistryEndpoint {
    &self.requester.endpoint
  }

  /// Every repository in the catalog, following pagination links.
  pub async fn catalog(&self) -> Result<Vec<String>, RegistryError> {
    let mut repositories = Vec::new();
    let mut next = Some(
      self
        .requester
        .endpoint
        .join(&format!("v2/_catalog?n={}", self.page_size))?,
    );
    let mut pages = 0usize;

    while let Some(url) = next.take() {
      let (page, link): (Catalog, _) = self.requester.get_json(url).await?;
      pages += 1;
      repositories.extend(page.repositories.unwrap_or_default());
      next = link;
    }

    debug!(pages, repositories = repositories.len(), "read registry catalog");
    Ok(repositories)
  }

  /// Tag observations for `repositories`, keyed by repository key.
  pub async fn tags(&self, repositories: Vec<String>) -> Result<ObservationMap, RegistryError> {
    if repositories.is_empty() {
      return Ok(ObservationMap::new());
    }

    let workers = self.concurrency.min(repositories.len());
    let (tx, rx) = mpsc::channel::<String>(workers);
    let rx = Arc::new(Mutex::new(rx));
    let mut set = JoinSet::new();

    for _ in 0..workers {
      let rx = Arc::clone(&rx);
      let requester = self.requester.clone();
      set.spawn(async move {
        let mut results = Vec::new();
        loop {
          let next = rx.lock().await.recv().await;
          let Some(repository) = next else {
            break;
          };
          match requester.tags(&repository).await {
            Ok(result) => results.push(result),
            Err(e) => {
              rx.lock().await.close();
              return Err(e);
            }
          }
        }
        Ok(results)
      });
    }
    drop(rx);

    for repository in repositories {
      if tx.send(repository).await.is_err() {
        break;
      }
    }
    drop(tx);

    let mut collected = Vec::new();
    let mut failure = None;
    while let Some(joined) = set.join_next().await {
      match joined {
        Ok(Ok(results)) => collected.extend(results),
        Ok(Err(e)) => {
          failure.get_or_insert(e);
        }
        Err(e) => {
          failure.get_or_insert(RegistryError::Worker(e.to_string()));
        }
      }
    }
    if let Some(e) = failure {
      return Err(e);
    }

    let mut map = ObservationMap::new();
    for (name, tags) in collected {
      let mut entry = ObservationMap::new();
      entry.insert(repository_key(&name), parse_tags(&tags));
      map.overlay_channels(entry);
    }
    Ok(map)
  }

  /// Catalog plus tags from the remote registry only.
  pub async fn fetch_remote(&self) -> Result<ObservationMap, RegistryError> {
    let repositories = self.catalog().await?;
    let map = self.tags(repositories).await?;
    info!(components = map.len(), "read registry versions");
    Ok(map)
  }
}

impl VersionFetcher for RegistryFetcher {
  fn name(&self) -> &'static str {
    "registry"
  }

  async fn fetch(&self) -> Result<ObservationMap, FetchError> {
    let remote = self.fetch_remote().await?;
    let Some(lister) = &self.local else {
      return Ok(remote);
    };

    let mut merged = lister.list(self.endpoint().host()).await;
    if merged.is_empty() {
      warn!("local image cache is empty, using registry only");
    }
    merged.overlay_channels(remote);
    Ok(merged)
  }
}
