//! Where a tree's data comes from.

use std::fmt;

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};

/// Range of rows a viewer is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRange {
    pub start: usize,
    pub end: usize,
}

/// The party consuming a data source's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionViewer {
    /// Rows currently viewed. A tree always views everything.
    pub view_change: ListRange,
}

impl Default for CollectionViewer {
    fn default() -> Self {
        Self {
            view_change: ListRange {
                start: 0,
                end: usize::MAX,
            },
        }
    }
}

/// A source a tree connects to and later disconnects from.
pub trait TreeDataSource<T>: Send {
    /// Start streaming data snapshots to `viewer`.
    fn connect(&mut self, viewer: &CollectionViewer) -> BoxStream<'static, Vec<T>>;

    /// Stop streaming to `viewer`.
    fn disconnect(&mut self, _viewer: &CollectionViewer) {}
}

/// Data given to a tree: a fixed array, a stream of snapshots, or a
/// connectable source.
pub enum DataSource<T> {
    Array(Vec<T>),
    Stream(BoxStream<'static, Vec<T>>),
    Connectable(Box<dyn TreeDataSource<T>>),
}

impl<T: Send + 'static> DataSource<T> {
    /// A stream of snapshots.
    pub fn stream(stream: impl Stream<Item = Vec<T>> + Send + 'static) -> Self {
        Self::Stream(stream.boxed())
    }

    /// A connectable source.
    pub fn connectable(source: impl TreeDataSource<T> + 'static) -> Self {
        Self::Connectable(Box::new(source))
    }
}

impl<T> From<Vec<T>> for DataSource<T> {
    fn from(data: Vec<T>) -> Self {
        Self::Array(data)
    }
}

impl<T> fmt::Debug for DataSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(data) => write!(f, "DataSource::Array({} nodes)", data.len()),
            Self::Stream(_) => f.write_str("DataSource::Stream"),
            Self::Connectable(_) => f.write_str("DataSource::Connectable"),
        }
    }
}

/// Connectable source over a fixed array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDataSource<T> {
    data: Vec<T>,
}

impl<T> ArrayDataSource<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }
}

impl<T: Clone + Send + Sync + 'static> TreeDataSource<T> for ArrayDataSource<T> {
    fn connect(&mut self, _viewer: &CollectionViewer) -> BoxStream<'static, Vec<T>> {
        stream::once(futures::future::ready(self.data.clone())).boxed()
    }
}
