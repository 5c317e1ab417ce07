//! Sequential and parallel execution of query actions.
//!
//! ## Partitioning
//! Parallel execution splits the rows of **one chunk** into
//! `task_count = worker_count + 1` contiguous sections. The section length is
//! `ceil(len / task_count)` rounded up to the query's alignment multiple, so
//! no boundary falls inside a unit the action may process as a whole. The
//! sections are disjoint, in order, and cover `[0, len)`; trailing sections
//! may be empty.
//!
//! A chunk shorter than `task_count * min_parallel_chunk_length` is processed
//! by the calling thread.
//!
//! ## Concurrency
//! `run_parallel` blocks until every section has been processed. The store
//! is borrowed exclusively for the duration, so no structural change can
//! overlap the job.

use std::ops::Range;

use tracing::debug_span;

use crate::engine::query::{ArchetypeQuery, ComponentSet};
use crate::engine::store::EntityStore;
use crate::engine::types::{EntityId, CHUNK_SIZE};

/// Splits `[0, len)` into `task_count` contiguous sections whose lengths are
/// multiples of `multiple`, except for the last non-empty one.
pub fn partition_sections(len: usize, task_count: usize, multiple: usize) -> Vec<Range<usize>> {
    let mut sections = Vec::with_capacity(task_count.max(1));
    partition_sections_into(len, task_count, multiple, &mut sections);
    sections
}

/// [`partition_sections`] into a reused buffer.
pub fn partition_sections_into(len: usize, task_count: usize, multiple: usize, out: &mut Vec<Range<usize>>) {
    out.clear();
    let task_count = task_count.max(1);
    let multiple = multiple.max(1);
    let section = len.div_ceil(task_count).div_ceil(multiple) * multiple;

    let mut start = 0;
    for _ in 0..task_count {
        let end = (start + section).min(len);
        out.push(start..end);
        start = end;
    }
}

/// A query action bound to its execution settings.
///
/// Created by [`ArchetypeQuery::for_each`].
pub struct QueryJob<'q, Q: ComponentSet, F> {
    query: &'q mut ArchetypeQuery<Q>,
    action: F,
    min_parallel_chunk_length: Option<usize>,
    worker_count: Option<usize>,
}

impl<'q, Q, F> QueryJob<'q, Q, F>
where
    Q: ComponentSet,
    F: for<'a> FnMut(&'a [EntityId], Q::SlicesMut<'a>),
{
    pub(crate) fn new(query: &'q mut ArchetypeQuery<Q>, action: F) -> Self {
        Self { query, action, min_parallel_chunk_length: None, worker_count: None }
    }

    /// Overrides the store's minimum rows per parallel task.
    #[must_use]
    pub fn min_parallel_chunk_length(mut self, length: usize) -> Self {
        self.min_parallel_chunk_length = Some(length.max(1));
        self
    }

    /// Overrides the store's worker count.
    #[must_use]
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers);
        self
    }

    /// Row multiple every section boundary respects.
    pub fn multiple(&self) -> usize {
        self.query.multiple()
    }

    /// Calls the action once per chunk on the calling thread.
    pub fn run(self, store: &mut EntityStore) {
        let QueryJob { query, mut action, .. } = self;
        query.refresh(store);

        let archetypes = store.archetypes_mut();
        for &id in query.matched() {
            let (entities, mut columns) = archetypes[id as usize].split_columns_mut(query.component_ids());
            let mut chunks = Q::chunks_mut(&mut columns);
            for entities in entities.chunks(CHUNK_SIZE) {
                let Some(slices) = Q::next_chunk(&mut chunks) else { break };
                action(entities, slices);
            }
        }
    }

    /// Calls the action on disjoint sections of each chunk across the rayon
    /// pool, and blocks until all sections are done.
    pub fn run_parallel(self, store: &mut EntityStore)
    where
        F: for<'a> Fn(&'a [EntityId], Q::SlicesMut<'a>) + Send + Sync,
    {
        let task_count = self
            .worker_count
            .unwrap_or_else(|| store.config().resolved_worker_count())
            .saturating_add(1);
        let min_length = self
            .min_parallel_chunk_length
            .unwrap_or(store.config().min_parallel_chunk_length)
            .max(1);
        let QueryJob { query, action, .. } = self;
        let multiple = query.multiple();

        let span = debug_span!("run_parallel", task_count, multiple, min_length);
        let _enter = span.enter();

        query.refresh(store);
        let mut sections = query.sections.rent(task_count);
        let sequential_below = task_count.saturating_mul(min_length);

        let archetypes = store.archetypes_mut();
        for &id in query.matched() {
            let (entities, mut columns) = archetypes[id as usize].split_columns_mut(query.component_ids());
            let mut chunks = Q::chunks_mut(&mut columns);
            for entities in entities.chunks(CHUNK_SIZE) {
                let Some(slices) = Q::next_chunk(&mut chunks) else { break };
                if task_count == 1 || entities.len() < sequential_below {
                    action(entities, slices);
                    continue;
                }
                partition_sections_into(entities.len(), task_count, multiple, &mut sections);
                let live = sections.partition_point(|section| !section.is_empty());
                run_sections::<Q, F>(entities, slices, &sections[..live], &action);
            }
        }

        query.sections.give_back(sections);
    }
}

/// Runs `action` once per section, splitting the chunk in halves with
/// `rayon::join` until each half holds a single section.
///
/// `sections` are consecutive and non-empty; `entities` and `slices` start at
/// `sections[0].start`.
fn run_sections<'c, Q, F>(
    entities: &'c [EntityId],
    slices: Q::SlicesMut<'c>,
    sections: &[Range<usize>],
    action: &F,
)
where
    Q: ComponentSet,
    F: for<'a> Fn(&'a [EntityId], Q::SlicesMut<'a>) + Send + Sync,
{
    match sections {
        [] => {}
        [_] => action(entities, slices),
        _ => {
            let (left, right) = sections.split_at(sections.len() / 2);
            let mid = right[0].start - left[0].start;
            let (left_ids, right_ids) = entities.split_at(mid);
            let (left_slices, right_slices) = Q::split_at_mut(slices, mid);
            rayon::join(
                || run_sections::<Q, F>(left_ids, left_slices, left, action),
                || run_sections::<Q, F>(right_ids, right_slices, right, action),
            );
        }
    }
}
