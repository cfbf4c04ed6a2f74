use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Generator;
use crate::MIB;
use crate::context::EngineContext;
use crate::counters::ValueCounter;
use crate::error::OperationError;

const INTERVAL: Duration = Duration::from_secs(2);
const BUFFER_BYTES: std::ops::Range<usize> = MIB..10 * MIB;
pub const POOL_CAP: usize = 50;

/// Buffers held by the memory-churn generator.
///
/// Exclusively owned by the generator; other tasks only ever see the
/// occupancy it publishes.
#[derive(Debug, Default)]
pub struct MemoryPool {
    buffers: Vec<Vec<u8>>,
    cap: usize,
}

impl MemoryPool {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            buffers: Vec::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffers.len() >= self.cap
    }

    pub fn total_bytes(&self) -> u64 {
        self.buffers.iter().map(|b| b.len() as u64).sum()
    }

    /// Appends a buffer of exactly `bytes` random bytes.
    ///
    /// Fails without touching the pool if it is full or the allocation
    /// cannot be satisfied.
    pub fn allocate<R: RngCore + ?Sized>(
        &mut self,
        bytes: usize,
        rng: &mut R,
    ) -> Result<(), OperationError> {
        if self.is_full() {
            return Err(OperationError::Allocation { bytes });
        }
        self.push(random_buffer(bytes, rng)?)
    }

    /// Adds an already filled buffer.
    pub fn push(&mut self, buf: Vec<u8>) -> Result<(), OperationError> {
        if self.is_full() {
            return Err(OperationError::Allocation { bytes: buf.len() });
        }
        self.buffers.push(buf);
        Ok(())
    }

    /// Removes the buffer at `index`, returning its size.
    pub fn release(&mut self, index: usize) -> Option<usize> {
        if index < self.buffers.len() {
            Some(self.buffers.remove(index).len())
        } else {
            None
        }
    }
}

/// `bytes` of random data, or `Allocation` when the memory cannot be reserved.
pub fn random_buffer<R: RngCore + ?Sized>(
    bytes: usize,
    rng: &mut R,
) -> Result<Vec<u8>, OperationError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| OperationError::Allocation { bytes })?;
    buf.resize(bytes, 0);
    rng.fill_bytes(&mut buf);
    Ok(buf)
}

/// What one churn iteration does to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolAction {
    Allocate(usize),
    Release(usize),
    Idle,
}

impl PoolAction {
    /// Coin flip: allocate when below cap, otherwise release a random buffer.
    pub fn choose<R: Rng + ?Sized>(pool: &MemoryPool, rng: &mut R) -> Self {
        if rng.gen_bool(0.5) && !pool.is_full() {
            PoolAction::Allocate(rng.gen_range(BUFFER_BYTES))
        } else if !pool.is_empty() {
            PoolAction::Release(rng.gen_range(0..pool.len()))
        } else {
            PoolAction::Idle
        }
    }
}

pub struct MemoryChurnGenerator {
    ctx: EngineContext,
    pool: MemoryPool,
    rng: StdRng,
}

impl MemoryChurnGenerator {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            pool: MemoryPool::with_cap(POOL_CAP),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Applies `action`, then publishes the pool occupancy.
    pub fn apply(&mut self, action: PoolAction) -> Result<(), OperationError> {
        match action {
            PoolAction::Allocate(bytes) => self.pool.allocate(bytes, &mut self.rng)?,
            PoolAction::Release(index) => {
                self.pool.release(index);
            }
            PoolAction::Idle => {}
        }
        self.publish(action)
    }

    fn publish(&self, action: PoolAction) -> Result<(), OperationError> {
        let total = self.pool.total_bytes();
        self.ctx.activity.publish_memory_bytes(total);
        self.ctx
            .counters
            .set(ValueCounter::MemoryUsage, total / MIB as u64)?;

        debug!(?action, buffers = self.pool.len(), total_bytes = total, "memory pool churned");
        Ok(())
    }
}

#[async_trait]
impl Generator for MemoryChurnGenerator {
    fn name(&self) -> &'static str {
        "memory_churn"
    }

    async fn iterate(&mut self, _cancel: &CancellationToken) -> Result<(), OperationError> {
        let action = PoolAction::choose(&self.pool, &mut self.rng);
        let PoolAction::Allocate(bytes) = action else {
            return self.apply(action);
        };

        // Filling up to 10 MiB runs on the blocking pool.
        let mut worker_rng = StdRng::seed_from_u64(self.rng.r#gen());
        let buf =
            tokio::task::spawn_blocking(move || random_buffer(bytes, &mut worker_rng)).await??;
        self.pool.push(buf)?;
        self.publish(action)
    }

    fn next_delay(&mut self) -> Duration {
        INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::counters::{InProcessCounterSubsystem, SettleDelays};

    async fn generator() -> MemoryChurnGenerator {
        let ctx = EngineContext::new("memory tests");
        ctx.counters
            .provision(&InProcessCounterSubsystem::new(), "", SettleDelays::NONE)
            .await
            .unwrap();
        MemoryChurnGenerator::new(ctx)
    }

    #[tokio::test]
    async fn first_five_mib_buffer_publishes_five_megabytes() {
        let mut g = generator().await;

        g.apply(PoolAction::Allocate(5 * MIB)).unwrap();

        assert_eq!(g.pool().len(), 1);
        assert_eq!(g.ctx.counters.value(ValueCounter::MemoryUsage), Some(5));
        assert_eq!(g.ctx.activity.snapshot().memory_bytes, 5 * MIB as u64);
    }

    #[tokio::test]
    async fn published_megabytes_round_down() {
        let mut g = generator().await;

        g.apply(PoolAction::Allocate(MIB + MIB / 2)).unwrap();
        g.apply(PoolAction::Allocate(MIB + MIB / 2)).unwrap();
        assert_eq!(g.ctx.counters.value(ValueCounter::MemoryUsage), Some(3));

        g.apply(PoolAction::Release(0)).unwrap();
        assert_eq!(g.ctx.counters.value(ValueCounter::MemoryUsage), Some(1));
    }

    #[tokio::test]
    async fn failed_allocation_leaves_the_pool_unchanged() {
        let mut g = generator().await;
        g.apply(PoolAction::Allocate(1024)).unwrap();

        let res = g.apply(PoolAction::Allocate(usize::MAX));

        assert!(matches!(res, Err(OperationError::Allocation { .. })));
        assert_eq!(g.pool().len(), 1);
        assert_eq!(g.pool().total_bytes(), 1024);
    }

    #[tokio::test]
    async fn iterations_fill_buffers_off_the_async_workers_and_publish() {
        let mut g = generator().await;
        let cancel = CancellationToken::new();

        for _ in 0..4 {
            g.iterate(&cancel).await.unwrap();
        }

        let total = g.pool().total_bytes();
        assert!(g.pool().len() <= POOL_CAP);
        assert_eq!(g.ctx.activity.snapshot().memory_bytes, total);
        assert_eq!(
            g.ctx.counters.value(ValueCounter::MemoryUsage),
            Some(total / MIB as u64)
        );
    }

    #[test]
    fn random_buffer_has_the_requested_size() {
        let mut rng = StdRng::seed_from_u64(5);

        assert_eq!(random_buffer(4_096, &mut rng).unwrap().len(), 4_096);
        assert!(matches!(
            random_buffer(usize::MAX, &mut rng),
            Err(OperationError::Allocation { bytes: usize::MAX })
        ));
    }

    #[test]
    fn full_pool_refuses_allocation() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = MemoryPool::with_cap(2);
        pool.allocate(8, &mut rng).unwrap();
        pool.allocate(8, &mut rng).unwrap();

        assert!(pool.allocate(8, &mut rng).is_err());
        assert!(pool.push(vec![0; 8]).is_err());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn release_out_of_range_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = MemoryPool::with_cap(4);
        pool.allocate(16, &mut rng).unwrap();

        assert_eq!(pool.release(3), None);
        assert_eq!(pool.release(0), Some(16));
        assert!(pool.is_empty());
    }

    #[test]
    fn choose_respects_pool_state() {
        let mut rng = StdRng::seed_from_u64(99);
        let empty = MemoryPool::with_cap(POOL_CAP);

        for _ in 0..200 {
            match PoolAction::choose(&empty, &mut rng) {
                PoolAction::Allocate(bytes) => assert!(BUFFER_BYTES.contains(&bytes)),
                PoolAction::Idle => {}
                PoolAction::Release(_) => panic!("released from an empty pool"),
            }
        }
    }

    proptest! {
        #[test]
        fn pool_never_exceeds_cap_and_total_matches(
            seed in any::<u64>(),
            steps in proptest::collection::vec((any::<bool>(), 1usize..4096, any::<usize>()), 0..200),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut pool = MemoryPool::with_cap(POOL_CAP);
            let mut sizes: Vec<usize> = Vec::new();

            for (grow, bytes, pick) in steps {
                if grow && !pool.is_full() {
                    pool.allocate(bytes, &mut rng).unwrap();
                    sizes.push(bytes);
                } else if !pool.is_empty() {
                    let index = pick % pool.len();
                    prop_assert_eq!(pool.release(index), Some(sizes.remove(index)));
                }

                prop_assert!(pool.len() <= POOL_CAP);
                prop_assert_eq!(pool.total_bytes(), sizes.iter().map(|s| *s as u64).sum::<u64>());
            }
        }
    }
}
