//! Lazy Sequence Combinators
//!
//! Small operators over fallible streams (`Stream<Item = Result<T, E>>`).
//! Nothing is buffered beyond the element in flight, so pipelines over a
//! multi-page link stream issue follow-up requests as records arrive
//! instead of after pagination completes.

use futures::future::{self, Future, FutureExt};
use futures::stream::{Stream, TryStreamExt};

/// Apply an async transform to every element, preserving order. Errors
/// pass through untouched.
pub fn map<S, T, U, E, F, Fut>(stream: S, mut transform: F) -> impl Stream<Item = Result<U, E>>
where
    S: Stream<Item = Result<T, E>>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = U>,
{
    stream.and_then(move |item| transform(item).map(Ok::<U, E>))
}

/// Like [`map`] for transforms that can fail. A transform error is yielded
/// in place of the element.
pub fn try_map<S, T, U, E, F, Fut>(stream: S, transform: F) -> impl Stream<Item = Result<U, E>>
where
    S: Stream<Item = Result<T, E>>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    stream.and_then(transform)
}

/// Keep only elements matching `predicate`. The predicate runs exactly
/// once per upstream element.
pub fn filter<S, T, E, P>(stream: S, mut predicate: P) -> impl Stream<Item = Result<T, E>>
where
    S: Stream<Item = Result<T, E>>,
    P: FnMut(&T) -> bool,
{
    stream.try_filter(move |item| future::ready(predicate(item)))
}

/// Drain the stream into a `Vec`. The first error fails the whole call and
/// anything gathered before it is dropped.
pub async fn collect<S, T, E>(stream: S) -> Result<Vec<T>, E>
where
    S: Stream<Item = Result<T, E>>,
{
    stream.try_collect().await
}
