//! Presenter leadership lease.

use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

/// Reasons a lease operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// Another presenter holds a live lease.
    #[error("another presenter is already connected")]
    Held,
    /// Nobody holds the lease.
    #[error("presenter lease not initialised yet")]
    Vacant,
    /// The token does not match the live lease.
    #[error("invalid presenter token")]
    Mismatch,
    /// The token matched a lease that has lapsed.
    #[error("presenter lease expired")]
    Expired,
}

#[derive(Debug, Clone)]
struct Lease {
    token: String,
    expires_at: Instant,
}

/// Holds at most one presenter lease; the holder drives the countdown.
#[derive(Debug, Default)]
pub struct LeaseSlot {
    current: Option<Lease>,
}

impl LeaseSlot {
    /// Claim the lease, taking over a lapsed one. Returns the new token.
    pub fn claim(&mut self, now: Instant, ttl: Duration) -> Result<String, LeaseError> {
        if self.is_active(now) {
            return Err(LeaseError::Held);
        }
        let token = Uuid::new_v4().to_string();
        self.current = Some(Lease {
            token: token.clone(),
            expires_at: now + ttl,
        });
        Ok(token)
    }

    /// Check that `token` names the live lease.
    pub fn verify(&self, token: &str, now: Instant) -> Result<(), LeaseError> {
        let lease = self.current.as_ref().ok_or(LeaseError::Vacant)?;
        if lease.token != token {
            return Err(LeaseError::Mismatch);
        }
        if lease.expires_at <= now {
            return Err(LeaseError::Expired);
        }
        Ok(())
    }

    /// Extend the lease held by `token`.
    pub fn renew(&mut self, token: &str, now: Instant, ttl: Duration) -> Result<(), LeaseError> {
        self.verify(token, now)?;
        if let Some(lease) = self.current.as_mut() {
            lease.expires_at = now + ttl;
        }
        Ok(())
    }

    /// Extend whichever lease is live; `false` when none is.
    pub fn renew_active(&mut self, now: Instant, ttl: Duration) -> bool {
        match self.current.as_mut() {
            Some(lease) if lease.expires_at > now => {
                lease.expires_at = now + ttl;
                true
            }
            _ => false,
        }
    }

    /// Drop the lease if `token` holds it.
    pub fn release(&mut self, token: &str) -> bool {
        if self.current.as_ref().is_some_and(|lease| lease.token == token) {
            self.current = None;
            true
        } else {
            false
        }
    }

    /// Whether a lease is currently live.
    pub fn is_active(&self, now: Instant) -> bool {
        self.current.as_ref().is_some_and(|lease| lease.expires_at > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(15);

    #[test]
    fn second_claim_is_refused_while_live() {
        let now = Instant::now();
        let mut slot = LeaseSlot::default();
        let token = slot.claim(now, TTL).unwrap();
        assert_eq!(slot.claim(now, TTL), Err(LeaseError::Held));
        assert!(slot.verify(&token, now).is_ok());
        assert_eq!(slot.verify("nope", now), Err(LeaseError::Mismatch));
    }

    #[test]
    fn lapsed_lease_can_be_taken_over() {
        let now = Instant::now();
        let mut slot = LeaseSlot::default();
        let old = slot.claim(now, TTL).unwrap();
        let later = now + TTL + Duration::from_secs(1);
        assert_eq!(slot.verify(&old, later), Err(LeaseError::Expired));
        assert!(!slot.renew_active(later, TTL));
        let new = slot.claim(later, TTL).unwrap();
        assert_ne!(old, new);
        assert_eq!(slot.verify(&old, later), Err(LeaseError::Mismatch));
    }

    #[test]
    fn renewal_pushes_expiry() {
        let now = Instant::now();
        let mut slot = LeaseSlot::default();
        let token = slot.claim(now, TTL).unwrap();
        let almost = now + TTL - Duration::from_secs(1);
        slot.renew(&token, almost, TTL).unwrap();
        assert!(slot.is_active(now + TTL + Duration::from_secs(5)));
        assert!(slot.renew_active(almost, TTL));
    }

    #[test]
    fn release_requires_matching_token() {
        let now = Instant::now();
        let mut slot = LeaseSlot::default();
        let token = slot.claim(now, TTL).unwrap();
        assert!(!slot.release("other"));
        assert!(slot.release(&token));
        assert_eq!(slot.verify(&token, now), Err(LeaseError::Vacant));
    }
}
