//! Payload iterators.
//!
//! Each iterator takes a snapshot of substrate ids when it is built and
//! resolves them to payloads one at a time, skipping ids that carry no
//! payload at that moment. Iterators are single-pass and cannot be
//! restarted; build a new one instead.

use std::sync::Arc;

use crate::model::{EdgeId, NodeId};

/// Forward-only iterator over the payloads bound to a list of ids.
pub struct PayloadIter<T, Id> {
    ids: std::vec::IntoIter<Id>,
    resolve: Box<dyn Fn(Id) -> Option<Arc<T>>>,
}

pub type NodeIter<N> = PayloadIter<N, NodeId>;
pub type EdgeIter<E> = PayloadIter<E, EdgeId>;

impl<T, Id> PayloadIter<T, Id> {
    pub(crate) fn new(ids: Vec<Id>, resolve: impl Fn(Id) -> Option<Arc<T>> + 'static) -> Self {
        Self { ids: ids.into_iter(), resolve: Box::new(resolve) }
    }
}

impl<T, Id> Iterator for PayloadIter<T, Id> {
    type Item = Arc<T>;

    fn next(&mut self) -> Option<Arc<T>> {
        self.ids.by_ref().find_map(|id| (self.resolve)(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len()))
    }
}

impl<T, Id> std::fmt::Debug for PayloadIter<T, Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadIter").field("remaining_ids", &self.ids.len()).finish()
    }
}
