//! AT-URI handling for record addresses (`at://authority/collection/rkey`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

pub const AT_SCHEME: &str = "at://";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtUri {
    /// A DID (`did:...`) or a handle.
    pub authority: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    pub fn new(authority: impl Into<String>, collection: impl Into<String>, rkey: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            collection: collection.into(),
            rkey: rkey.into(),
        }
    }

    pub fn parse(uri: &str) -> Result<Self, ResolveError> {
        let invalid = |reason: &str| ResolveError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let rest = uri.strip_prefix(AT_SCHEME).ok_or_else(|| invalid("missing at:// scheme"))?;
        // Drop any query or fragment.
        let rest = rest.split(['?', '#']).next().unwrap_or_default();

        let mut parts = rest.split('/');
        let authority = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| invalid("missing authority"))?;
        let collection = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| invalid("missing collection"))?;
        let rkey = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| invalid("missing record key"))?;
        if parts.next().is_some_and(|s| !s.is_empty()) {
            return Err(invalid("too many path segments"));
        }

        Ok(Self::new(authority, collection, rkey))
    }

    /// True when the authority is already a canonical identifier.
    pub fn has_did(&self) -> bool {
        self.authority.starts_with("did:")
    }

    pub fn with_authority(&self, authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}/{}", AT_SCHEME, self.authority, self.collection, self.rkey)
    }
}

impl FromStr for AtUri {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
