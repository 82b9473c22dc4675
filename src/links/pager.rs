//! Lazy pagination over the links route.
//!
//! Records are pulled one at a time. A page is requested only when the
//! previous page's records are used up, so dropping the stream early stops
//! further requests.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};

use super::{LinkIndexClient, LinkQuery, LinkRecord};
use crate::error::LinkIndexError;

pub type LinkStream = BoxStream<'static, Result<LinkRecord, LinkIndexError>>;

enum Cursor {
    Start,
    Next(String),
    Exhausted,
}

struct PagerState {
    client: LinkIndexClient,
    query: LinkQuery,
    buffered: VecDeque<LinkRecord>,
    cursor: Cursor,
}

impl LinkIndexClient {
    /// Stream every record linking to `query.target`, across all pages, in
    /// server order.
    ///
    /// The stream ends when a page comes back without a cursor. An index
    /// that always returns a cursor never ends it, so bound consumption with
    /// `StreamExt::take` if a hard cap matters. A failed request is yielded
    /// once as an error and ends the stream.
    pub fn links(&self, query: LinkQuery) -> LinkStream {
        let state = PagerState {
            client: self.clone(),
            query,
            buffered: VecDeque::new(),
            cursor: Cursor::Start,
        };

        stream::try_unfold(state, next_record).boxed()
    }
}

async fn next_record(mut state: PagerState) -> Result<Option<(LinkRecord, PagerState)>, LinkIndexError> {
    loop {
        if let Some(record) = state.buffered.pop_front() {
            return Ok(Some((record, state)));
        }

        let cursor = match std::mem::replace(&mut state.cursor, Cursor::Exhausted) {
            Cursor::Exhausted => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(cursor) => Some(cursor),
        };

        // Empty pages with a cursor are skipped without yielding.
        let page = state.client.fetch_page(&state.query, cursor.as_deref()).await?;
        state.cursor = match page.cursor {
            Some(next) => Cursor::Next(next),
            None => Cursor::Exhausted,
        };
        state.buffered.extend(page.records);
    }
}
