//! Typed cursor over streamed documents

use crate::error::{PersistenceError, PersistenceResult};
use super::driver::DocumentStream;
use super::schema::Entity;
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Cursor-mode `find` results, decoded one document at a time
pub struct EntityCursor<T> {
    inner: BoxStream<'static, PersistenceResult<T>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityCursor<T> {
    pub(crate) fn new(documents: DocumentStream) -> Self {
        let inner = documents
            .map(|document| {
                document.and_then(|document| {
                    bson::from_document::<T>(document).map_err(PersistenceError::from)
                })
            })
            .boxed();
        Self {
            inner,
            _entity: PhantomData,
        }
    }

    /// Drain the cursor, stopping at the first error
    pub async fn collect_all(self) -> PersistenceResult<Vec<T>> {
        self.try_collect().await
    }
}

impl<T> Stream for EntityCursor<T> {
    type Item = PersistenceResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> fmt::Debug for EntityCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCursor").finish_non_exhaustive()
    }
}
