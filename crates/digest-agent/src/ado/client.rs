//! Azure DevOps work item tracking client.
//!
//! | Operation            | Request                                        |
//! |----------------------|------------------------------------------------|
//! | `fetch_item`         | `GET {base}/{id}?$expand=all`                  |
//! | `fetch_linked_items` | `GET {base}/{id}?$expand=relations`, then `GET {base}/{target}` per link |
//! | `fetch_history`      | `GET {base}/{id}/updates`                      |
//!
//! `{base}` is `{org_url}/{project}/_apis/wit/workitems`; every request
//! carries `api-version=6.0`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use pipeline::{FetchError, Revision, WorkItem, WorkItemSource};

use super::auth::Credentials;
use super::wire::{WireUpdates, WireWorkItem};

pub const API_VERSION: &str = "6.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AdoClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl AdoClient {
    /// Client for `project` under the organization at `org_url`.
    pub fn new(
        org_url: &str,
        project: &str,
        credentials: Credentials,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport {
                what: "client setup".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/{}/_apis/wit/workitems",
                org_url.trim_end_matches('/'),
                project.trim_matches('/')
            ),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        what: &str,
    ) -> Result<T, FetchError> {
        debug!(url, "GET");
        let response = self
            .credentials
            .apply(self.http.get(url))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                what: what.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                what: what.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| FetchError::Decode {
            what: what.to_string(),
            message: e.to_string(),
        })
    }

    fn item_url(&self, id: u64, expand: Option<&str>) -> String {
        match expand {
            Some(expand) => format!(
                "{}/{id}?$expand={expand}&api-version={API_VERSION}",
                self.base_url
            ),
            None => format!("{}/{id}?api-version={API_VERSION}", self.base_url),
        }
    }
}

#[async_trait]
impl WorkItemSource for AdoClient {
    async fn fetch_item(&self, id: u64) -> Result<WorkItem, FetchError> {
        let wire: WireWorkItem = self
            .get_json(&self.item_url(id, Some("all")), &format!("work item {id}"))
            .await?;
        debug!(id, fields = wire.fields.len(), "fetched work item");
        Ok(wire.into())
    }

    async fn fetch_linked_items(&self, id: u64) -> Result<Vec<WorkItem>, FetchError> {
        let wire: WireWorkItem = self
            .get_json(
                &self.item_url(id, Some("relations")),
                &format!("relations of {id}"),
            )
            .await?;
        let primary = WorkItem::from(wire);

        let mut linked = Vec::new();
        for relation in primary.traversable_relations() {
            let target = relation.target_id;
            if target == id {
                continue;
            }
            match self
                .get_json::<WireWorkItem>(
                    &self.item_url(target, None),
                    &format!("linked work item {target}"),
                )
                .await
            {
                Ok(wire) => {
                    linked.push(WorkItem::from(wire).with_relationship(relation.kind.clone()))
                }
                Err(e) => warn!(id, target, error = %e, "skipping linked work item"),
            }
        }

        debug!(id, count = linked.len(), "fetched linked work items");
        Ok(linked)
    }

    async fn fetch_history(&self, id: u64) -> Result<Vec<Revision>, FetchError> {
        let url = format!("{}/{id}/updates?api-version={API_VERSION}", self.base_url);
        let updates: WireUpdates = self.get_json(&url, &format!("updates of {id}")).await?;
        Ok(updates.value.into_iter().map(Revision::from).collect())
    }
}
