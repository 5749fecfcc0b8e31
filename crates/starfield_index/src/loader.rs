use starfield_core::OctantId;
use starfield_storage::{Bucket, NodeIndex, OctreeSource, SmallKeyHashSet, StorageError};

use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
    executor::{block_on, ThreadPool},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// The outcome of one bucket read.
pub struct LoadCompletion<P> {
    pub node: NodeIndex,
    pub octant: OctantId,
    pub result: Result<Option<Bucket<P>>, StorageError>,
}

/// Reads buckets from an `OctreeSource` off of the frame loop.
///
/// Reads run on a `ThreadPool` when one is given. Without a pool they run inline in `request`, which blocks the caller on
/// I/O, so that mode is only meant for tests and offline tools. Either way, results only become visible through `poll`, so
/// the caller decides when they are applied. There is at most one read in flight per octant.
pub struct BucketLoader<P> {
    source: Arc<dyn OctreeSource<P>>,
    pool: Option<ThreadPool>,
    completion_tx: UnboundedSender<LoadCompletion<P>>,
    completion_rx: UnboundedReceiver<LoadCompletion<P>>,
    in_flight: SmallKeyHashSet<NodeIndex>,
    cancelled: Arc<AtomicBool>,
}

impl<P> BucketLoader<P>
where
    P: 'static + Send + Sync,
{
    pub fn new(source: Arc<dyn OctreeSource<P>>, pool: Option<ThreadPool>) -> Self {
        let (completion_tx, completion_rx) = unbounded();

        Self {
            source,
            pool,
            completion_tx,
            completion_rx,
            in_flight: SmallKeyHashSet::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source(&self) -> &Arc<dyn OctreeSource<P>> {
        &self.source
    }

    #[inline]
    pub fn is_in_flight(&self, node: NodeIndex) -> bool {
        self.in_flight.contains(&node)
    }

    #[inline]
    pub fn num_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Starts reading the bucket of `octant`. Returns `false` if a read for `node` is already in flight or the loader was
    /// cancelled.
    pub fn request(&mut self, node: NodeIndex, octant: OctantId) -> bool {
        if self.cancelled.load(Ordering::Acquire) || !self.in_flight.insert(node) {
            return false;
        }

        let source = self.source.clone();
        let completion_tx = self.completion_tx.clone();
        let cancelled = self.cancelled.clone();
        let task = async move {
            if cancelled.load(Ordering::Acquire) {
                return;
            }
            let result = source.read_bucket(octant);
            if cancelled.load(Ordering::Acquire) {
                return;
            }
            // The receiver is only gone after cancellation.
            let _ = completion_tx.unbounded_send(LoadCompletion {
                node,
                octant,
                result,
            });
        };

        match &self.pool {
            Some(pool) => pool.spawn_ok(task),
            None => block_on(task),
        }

        true
    }

    /// Takes up to `limit` finished reads, in completion order.
    pub fn poll(&mut self, limit: usize) -> Vec<LoadCompletion<P>> {
        let mut completions = Vec::new();
        while completions.len() < limit {
            match self.completion_rx.try_recv() {
                Ok(completion) => {
                    self.in_flight.remove(&completion.node);
                    completions.push(completion);
                }
                // Closed or empty.
                Err(_) => break,
            }
        }

        completions
    }

    /// Stops accepting completions. Reads that are still running finish, but their results are dropped.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.completion_rx.close();
        // Drain whatever was already queued.
        while self.completion_rx.try_recv().is_ok() {}
        self.in_flight.clear();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl<P> Drop for BucketLoader<P> {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
