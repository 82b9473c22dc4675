//! Linked-Record Client
//!
//! Backlink discovery and fallback record resolution for AT-protocol
//! records:
//! - Lazy, cursor-paginated streams of linking records from a link index
//! - Like / repost / reply counts from the same index
//! - Direct record + author fetch from the repository API, with bounded,
//!   error-classified retry

pub mod config;
pub mod error;
pub mod links;
pub mod repo;
pub mod resolver;
pub mod retry;
pub mod sequence;
pub mod uri;
pub mod utils;

// Re-exports for convenience
pub use config::LinkIndexConfig;
pub use error::{LinkIndexError, RepoError, ResolveError};
pub use links::{as_uri, Collection, CountSnapshot, LinkIndexClient, LinkQuery, LinkRecord, LinkStream};
pub use resolver::{DirectRecordResolver, ResolvedRecord, DIRECT_FETCH_CID};
pub use retry::{retry, RetryPolicy};
pub use uri::AtUri;
