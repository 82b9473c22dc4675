//! Link Index Module
//!
//! Client for a constellation-style link index: paginated backlink
//! queries and pre-aggregated interaction counts.

mod client;
mod counts;
mod pager;

pub use client::LinkIndexClient;
pub use counts::{CountSnapshot, LinkTally};
pub use pager::LinkStream;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::uri::AtUri;

/// Route serving paginated linking records.
pub const LINKS_ROUTE: &str = "links";
/// Route serving per-collection, per-path tallies for a target.
pub const ALL_LINKS_ROUTE: &str = "links/all";

pub const SUBJECT_URI_PATH: &str = ".subject.uri";
pub const SUBJECT_PATH: &str = ".subject";
pub const REPLY_PARENT_PATH: &str = ".reply.parent.uri";
pub const EMBED_RECORD_PATH: &str = ".embed.record.uri";

/// One record that links to the queried target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRecord {
    pub did: String,
    pub collection: String,
    pub rkey: String,
}

impl LinkRecord {
    pub fn at_uri(&self) -> AtUri {
        AtUri::new(&self.did, &self.collection, &self.rkey)
    }
}

/// `at://{did}/{collection}/{rkey}` for a link record.
pub fn as_uri(link: &LinkRecord) -> String {
    format!("at://{}/{}/{}", link.did, link.collection, link.rkey)
}

/// One response from the paginated links route. Missing fields read as
/// empty: no total, no records, no further pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub total: u64,
    #[serde(rename = "linking_records", default)]
    pub records: Vec<LinkRecord>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Record collections the link index can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "app.bsky.actor.profile")]
    ActorProfile,
    #[serde(rename = "app.bsky.feed.generator")]
    FeedGenerator,
    #[serde(rename = "app.bsky.feed.like")]
    Like,
    #[serde(rename = "app.bsky.feed.post")]
    Post,
    #[serde(rename = "app.bsky.feed.repost")]
    Repost,
    #[serde(rename = "app.bsky.feed.threadgate")]
    Threadgate,
    #[serde(rename = "app.bsky.graph.block")]
    Block,
    #[serde(rename = "app.bsky.graph.follow")]
    Follow,
    #[serde(rename = "app.bsky.graph.list")]
    List,
    #[serde(rename = "app.bsky.graph.listblock")]
    ListBlock,
    #[serde(rename = "app.bsky.graph.listitem")]
    ListItem,
    #[serde(rename = "app.bsky.graph.starterpack")]
    StarterPack,
    #[serde(rename = "chat.bsky.actor.declaration")]
    ChatDeclaration,
}

impl Collection {
    pub const ALL: [Collection; 13] = [
        Collection::ActorProfile,
        Collection::FeedGenerator,
        Collection::Like,
        Collection::Post,
        Collection::Repost,
        Collection::Threadgate,
        Collection::Block,
        Collection::Follow,
        Collection::List,
        Collection::ListBlock,
        Collection::ListItem,
        Collection::StarterPack,
        Collection::ChatDeclaration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ActorProfile => "app.bsky.actor.profile",
            Collection::FeedGenerator => "app.bsky.feed.generator",
            Collection::Like => "app.bsky.feed.like",
            Collection::Post => "app.bsky.feed.post",
            Collection::Repost => "app.bsky.feed.repost",
            Collection::Threadgate => "app.bsky.feed.threadgate",
            Collection::Block => "app.bsky.graph.block",
            Collection::Follow => "app.bsky.graph.follow",
            Collection::List => "app.bsky.graph.list",
            Collection::ListBlock => "app.bsky.graph.listblock",
            Collection::ListItem => "app.bsky.graph.listitem",
            Collection::StarterPack => "app.bsky.graph.starterpack",
            Collection::ChatDeclaration => "chat.bsky.actor.declaration",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unsupported collection '{}'", s))
    }
}

/// Parameters of a backlink query: who links to `target` from
/// `collection` through the field at `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQuery {
    pub target: String,
    pub collection: Collection,
    pub path: String,
}

impl LinkQuery {
    pub fn new(target: impl Into<String>, collection: Collection, path: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            collection,
            path: path.into(),
        }
    }

    pub fn likes(subject_uri: impl Into<String>) -> Self {
        Self::new(subject_uri, Collection::Like, SUBJECT_URI_PATH)
    }

    pub fn reposts(subject_uri: impl Into<String>) -> Self {
        Self::new(subject_uri, Collection::Repost, SUBJECT_URI_PATH)
    }

    pub fn replies(parent_uri: impl Into<String>) -> Self {
        Self::new(parent_uri, Collection::Post, REPLY_PARENT_PATH)
    }

    pub fn quotes(quoted_uri: impl Into<String>) -> Self {
        Self::new(quoted_uri, Collection::Post, EMBED_RECORD_PATH)
    }

    pub fn followers(did: impl Into<String>) -> Self {
        Self::new(did, Collection::Follow, SUBJECT_PATH)
    }

    pub fn blocks(did: impl Into<String>) -> Self {
        Self::new(did, Collection::Block, SUBJECT_PATH)
    }
}
