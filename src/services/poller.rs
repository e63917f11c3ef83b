//! Post-signup lookup of the newly provisioned firm.
//!
//! The account row and the firm row are written by separate steps, so right
//! after signup the firm may not be queryable yet. [`poll_firm_slug`] asks
//! the firm store by owner email until the signup's own firm shows up or the
//! [`BackoffPolicy`] runs out; [`resolve_dashboard_slug`] wraps it so the
//! signup flow always gets a slug to navigate to.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    db::store::{FirmStore, StoreResult},
    services::metrics::POLLER_OUTCOMES,
};

/// Exponential backoff with additive jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total number of queries, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Upper bound of the random extra, as a fraction of the delay (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(5),
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Rejects settings the delay arithmetic cannot use.
    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!("multiplier must be a finite number >= 1, got {}", self.multiplier));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!("jitter must be between 0 and 1, got {}", self.jitter));
        }
        Ok(())
    }

    /// Delay before the next query once `attempt` (1-based) came back empty,
    /// without jitter.
    pub fn base_delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// [`Self::base_delay_after`] plus a uniform extra in `[0, jitter * delay]`.
    pub fn delay_after<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.base_delay_after(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        // NaN survives the clamp and would panic in gen_range.
        if jitter.is_nan() || jitter == 0.0 {
            return delay;
        }
        delay + delay.mul_f64(rng.gen_range(0.0..=jitter))
    }

    /// Un-jittered waits between consecutive attempts.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.base_delay_after(a)).collect()
    }
}

/// Queries the firm store by owner email until the firm with
/// `signup_slug` appears.
///
/// Contact emails can be edited, so a firm found under `owner_email` with a
/// different slug belongs to someone else and counts as not visible yet.
///
/// Returns `Ok(Some(slug))` as soon as a query finds the firm, `Ok(None)`
/// once every attempt came back empty. A query error on the last attempt is
/// returned; errors on earlier attempts are logged and retried.
pub async fn poll_firm_slug(
    firms: &dyn FirmStore,
    owner_email: &str,
    signup_slug: &str,
    policy: &BackoffPolicy,
) -> StoreResult<Option<String>> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match firms.find_by_owner_email(owner_email).await {
            Ok(Some(firm)) if firm.slug == signup_slug => {
                debug!(attempt, slug = %firm.slug, "firm visible after signup");
                POLLER_OUTCOMES.with_label_values(&["found"]).inc();
                return Ok(Some(firm.slug));
            }
            Ok(Some(firm)) => {
                warn!(attempt, slug = %firm.slug, "firm under {owner_email} is not the one signed up for");
            }
            Ok(None) => debug!(attempt, "firm not visible yet"),
            Err(e) if attempt == attempts => {
                POLLER_OUTCOMES.with_label_values(&["error"]).inc();
                return Err(e);
            }
            Err(e) => warn!("firm lookup attempt {attempt} failed: {e}"),
        }

        if attempt < attempts {
            let delay = {
                let mut rng = rand::thread_rng();
                policy.delay_after(attempt, &mut rng)
            };
            tokio::time::sleep(delay).await;
        }
    }

    POLLER_OUTCOMES.with_label_values(&["exhausted"]).inc();
    Ok(None)
}

/// Slug to send a new signup to: the provisioned firm's slug when it shows
/// up in time, the slug typed at signup otherwise. Never fails.
pub async fn resolve_dashboard_slug(
    firms: &dyn FirmStore,
    owner_email: &str,
    signup_slug: &str,
    policy: &BackoffPolicy,
) -> String {
    match poll_firm_slug(firms, owner_email, signup_slug, policy).await {
        Ok(Some(slug)) => slug,
        Ok(None) => {
            info!("firm for {owner_email} not visible after {} attempts, using signup slug", policy.max_attempts);
            signup_slug.to_string()
        }
        Err(e) => {
            warn!("post-signup firm lookup failed for {owner_email}: {e}");
            signup_slug.to_string()
        }
    }
}
