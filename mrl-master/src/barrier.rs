use tracing::{debug, warn};

use crate::availability::AvailabilityPool;
use crate::worker_registry::RegistryHandle;

/// Wait until every online worker has reported free.
///
/// Takes one address out of the pool per online worker. The target follows
/// the online count as it changes: a failing job lowers it, a registration
/// raises it. Once reached, the registry confirms and puts the online workers
/// back into the pool for the next round. Returns the number of workers
/// drained.
///
/// Blocks forever if a job never returns, since its worker stays online but
/// never becomes free.
pub async fn wait_for_idle_workers(pool: &mut AvailabilityPool, registry: &RegistryHandle) -> usize {
    let mut online = registry.online_watch();
    let mut drained = 0;

    loop {
        let target = *online.borrow_and_update();
        if drained >= target && registry.close_barrier(drained).await {
            debug!(drained, "all online workers are free");
            return drained;
        }

        tokio::select! {
            address = pool.acquire() => {
                debug!(%address, drained = drained + 1, target, "worker reported free");
                drained += 1;
            }
            changed = online.changed() => {
                if changed.is_err() {
                    warn!("worker registry is gone, giving up on the barrier");
                    return drained;
                }
            }
        }
    }
}
