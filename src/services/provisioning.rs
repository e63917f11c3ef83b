//! Firm provisioning.
//!
//! Signup only records the firm profile on the account. This worker turns
//! that profile into a firm row plus a `tenant_member` membership, which is
//! why the dashboard slug shows up some time after signup completes.

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db::store::{StoreError, Stores},
    models::firm::Firm,
    services::metrics::PROVISIONING_COUNTER,
};

/// Sending side of the provisioning worker.
#[derive(Clone)]
pub struct ProvisioningQueue {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl ProvisioningQueue {
    /// Spawns the worker and returns its queue.
    pub fn start(stores: Stores) -> Self {
        let (queue, mut rx) = Self::detached();
        tokio::spawn(async move {
            while let Some(account_id) = rx.recv().await {
                // Errors are logged and counted inside; the worker keeps going.
                let _ = provision_account(&stores, account_id).await;
            }
        });
        queue
    }

    /// A queue with no worker attached; the caller owns the receiver.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, account_id: Uuid) {
        if self.tx.send(account_id).is_err() {
            warn!(account = %account_id, "provisioning worker is gone, left pending");
        }
    }
}

/// Provisions the firm for one account. `Ok(None)` when the account has
/// nothing pending.
pub async fn provision_account(stores: &Stores, account_id: Uuid) -> Result<Option<Firm>, StoreError> {
    let Some(account) = stores.accounts.find_by_id(account_id).await? else {
        warn!(account = %account_id, "provisioning requested for unknown account");
        PROVISIONING_COUNTER.with_label_values(&["missing"]).inc();
        return Ok(None);
    };
    let Some(profile) = account.pending_profile() else {
        return Ok(None);
    };

    match stores
        .firms
        .provision_for_account(account.id, &account.email, &profile)
        .await
    {
        Ok(firm) => {
            info!(account = %account.id, slug = %firm.slug, "firm provisioned");
            PROVISIONING_COUNTER.with_label_values(&["created"]).inc();
            Ok(Some(firm))
        }
        Err(StoreError::Conflict(constraint)) => {
            warn!(account = %account.id, slug = %profile.firm_slug, "provisioning conflict on {constraint}, left pending");
            PROVISIONING_COUNTER.with_label_values(&["conflict"]).inc();
            Err(StoreError::Conflict(constraint))
        }
        Err(e) => {
            warn!(account = %account.id, "provisioning failed: {e}");
            PROVISIONING_COUNTER.with_label_values(&["error"]).inc();
            Err(e)
        }
    }
}

/// Retries every account still waiting for its firm. Run at startup so a
/// restart never strands a signup.
pub async fn provision_pending(stores: &Stores) -> Result<usize, StoreError> {
    let pending = stores.accounts.list_pending().await?;
    let mut provisioned = 0;
    for account in pending {
        if let Ok(Some(_)) = provision_account(stores, account.id).await {
            provisioned += 1;
        }
    }
    if provisioned > 0 {
        info!("provisioned {provisioned} pending firm(s)");
    }
    Ok(provisioned)
}
