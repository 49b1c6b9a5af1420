//! Lazily resolved child sequences.
//!
//! Child lookups may be answered immediately (the children are already in
//! memory) or later (they are being loaded). [`Children`] hides that
//! distinction behind one stream type so callers never branch on it.

use std::fmt;
use std::future::Future;

use futures::stream::{self, BoxStream};
use futures::{FutureExt, Stream, StreamExt};

/// A possibly not-yet-resolved sequence of children.
///
/// Only the first emission is ever consumed.
pub struct Children<T> {
    stream: BoxStream<'static, Vec<T>>,
}

impl<T: Send + 'static> Children<T> {
    /// Children that are already known.
    pub fn ready(items: Vec<T>) -> Self {
        Self {
            stream: stream::once(futures::future::ready(items)).boxed(),
        }
    }

    /// No children.
    pub fn empty() -> Self {
        Self::ready(Vec::new())
    }

    /// Children delivered by a stream of snapshots.
    pub fn from_stream(stream: impl Stream<Item = Vec<T>> + Send + 'static) -> Self {
        Self {
            stream: stream.boxed(),
        }
    }

    /// Children delivered by a future.
    pub fn from_future(future: impl Future<Output = Vec<T>> + Send + 'static) -> Self {
        Self {
            stream: future.into_stream().boxed(),
        }
    }

    /// Wait for the first emission. A stream that ends without emitting
    /// yields no children.
    pub async fn first(mut self) -> Vec<T> {
        self.stream.next().await.unwrap_or_default()
    }

    /// Take the first emission if it is already available.
    ///
    /// Returns the untouched sequence when it would have to wait.
    pub fn try_first(mut self) -> Result<Vec<T>, Self> {
        match self.stream.next().now_or_never() {
            Some(items) => Ok(items.unwrap_or_default()),
            None => Err(self),
        }
    }
}

impl<T: Send + 'static> From<Vec<T>> for Children<T> {
    fn from(items: Vec<T>) -> Self {
        Self::ready(items)
    }
}

impl<T> fmt::Debug for Children<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Children").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::oneshot;

    use super::*;

    #[test]
    fn test_ready_children_resolve_immediately() {
        let children = Children::ready(vec![1, 2, 3]);
        assert_eq!(children.try_first().ok(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_pending_children_are_handed_back() {
        let (_tx, rx) = oneshot::channel::<Vec<u8>>();
        let children = Children::from_future(rx.map(|r| r.unwrap_or_default()));
        assert!(children.try_first().is_err());
    }

    #[test]
    fn test_ended_stream_has_no_children() {
        let children = Children::<u8>::from_stream(stream::empty());
        assert_eq!(children.try_first().ok(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_first_takes_only_first_emission() {
        let children = Children::from_stream(stream::iter(vec![vec![1], vec![2, 3]]));
        assert_eq!(children.first().await, vec![1]);
    }
}
