//! Scoped configuration lock handling.

use log::{debug, warn};

use crate::error::{Result, classify};
use crate::rpc::{Datastore, Operation, RpcReply};
use crate::transport::RpcTransport;

/// Tracks the device-side configuration lock for one session.
///
/// The flag is set only after a successful `<lock>` and cleared after every
/// unlock attempt, successful or not, so a lock never outlives the call
/// that took it.
#[derive(Debug, Default)]
pub struct LockCoordinator {
    target: Datastore,
    locked: bool,
}

impl LockCoordinator {
    /// Create a coordinator for the given datastore.
    pub fn new(target: Datastore) -> Self {
        Self {
            target,
            locked: false,
        }
    }

    /// The datastore being locked.
    pub fn target(&self) -> Datastore {
        self.target
    }

    /// Whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Take the lock. A `lock-denied` reply surfaces as a lock conflict.
    pub async fn acquire<T: RpcTransport>(&mut self, transport: &mut T) -> Result<RpcReply> {
        let reply = transport.lock(self.target).await.map_err(classify)?;
        self.locked = true;
        debug!("locked {} datastore", self.target);
        Ok(reply)
    }

    /// Release the lock. The flag is cleared even when the unlock fails.
    pub async fn release<T: RpcTransport>(&mut self, transport: &mut T) -> Result<RpcReply> {
        let result = transport.unlock(self.target).await;
        self.locked = false;
        let reply = result.map_err(classify)?;
        debug!("unlocked {} datastore", self.target);
        Ok(reply)
    }

    /// Run one operation under the lock.
    ///
    /// The lock is released on every exit path once it was acquired. When
    /// both the operation and the unlock fail, the operation's error is
    /// returned and the unlock error is logged.
    pub async fn scoped<T: RpcTransport>(
        &mut self,
        transport: &mut T,
        operation: &Operation,
    ) -> Result<RpcReply> {
        self.acquire(transport).await?;

        let outcome = transport.dispatch(operation).await;
        let released = self.release(transport).await;

        match (outcome, released) {
            (Ok(reply), Ok(_)) => Ok(reply),
            (Ok(_), Err(unlock_err)) => Err(unlock_err),
            (Err(fault), Ok(_)) => Err(classify(fault)),
            (Err(fault), Err(unlock_err)) => {
                warn!(
                    "unlock after failed {} also failed: {}",
                    operation.name(),
                    unlock_err
                );
                Err(classify(fault))
            }
        }
    }
}
