//! Interaction counts from the `links/all` route.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Collection, LinkIndexClient, REPLY_PARENT_PATH, SUBJECT_URI_PATH};
use crate::error::LinkIndexError;

/// Counts for one (collection, path) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTally {
    #[serde(default)]
    pub distinct_dids: u64,
    #[serde(default)]
    pub records: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AllLinksResponse {
    #[serde(default)]
    pub links: HashMap<String, HashMap<String, LinkTally>>,
}

impl AllLinksResponse {
    fn tally(&self, collection: Collection, path: &str) -> LinkTally {
        self.links
            .get(collection.as_str())
            .and_then(|paths| paths.get(path))
            .copied()
            .unwrap_or_default()
    }
}

/// Point-in-time interaction counts. The index is eventually consistent,
/// so repeated fetches may go down as well as up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountSnapshot {
    pub like_count: u64,
    pub repost_count: u64,
    pub reply_count: u64,
}

impl CountSnapshot {
    /// Likes and reposts count distinct accounts; replies count records,
    /// since one account may reply many times.
    pub(crate) fn from_response(response: &AllLinksResponse) -> Self {
        Self {
            like_count: response.tally(Collection::Like, SUBJECT_URI_PATH).distinct_dids,
            repost_count: response.tally(Collection::Repost, SUBJECT_URI_PATH).distinct_dids,
            reply_count: response.tally(Collection::Post, REPLY_PARENT_PATH).records,
        }
    }
}

impl LinkIndexClient {
    /// Fetch like, repost and reply counts for `target` in one request.
    /// Missing collections or paths count as zero.
    pub async fn counts(&self, target: &str) -> Result<CountSnapshot, LinkIndexError> {
        if target.trim().is_empty() {
            return Err(LinkIndexError::EmptyTarget);
        }

        let response: AllLinksResponse = self.get_json(&self.all_links_url, &[("target", target)]).await?;
        let snapshot = CountSnapshot::from_response(&response);
        debug!("Counts for {}: {:?}", target, snapshot);
        Ok(snapshot)
    }
}
