//! Round-robin identity pool
//!
//! Builds the identity slots from configuration (every egress entry crossed
//! with every browser profile) and hands them out in rotation so consecutive
//! session attempts present different network faces.

use crate::{
    Result,
    config::Settings,
    identity::{Identity, IdentityProvider},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Rotating pool of preconfigured identities
#[derive(Debug)]
pub struct RotatingIdentityPool {
    /// Identity slots in rotation order
    slots: Vec<Identity>,
    /// Next slot cursor
    cursor: AtomicUsize,
}

impl RotatingIdentityPool {
    /// Build the pool from settings.
    ///
    /// With no explicit egress list the pool falls back to the conventional
    /// proxy environment settings, and to direct egress when those are absent
    /// too. User agents are paired with locales, cycling the shorter list.
    pub fn from_settings(settings: &Settings) -> Self {
        let egress_options: Vec<Option<String>> = if settings.identity.egress.is_empty() {
            vec![settings.get_proxy_url()]
        } else {
            settings.identity.egress.iter().cloned().map(Some).collect()
        };

        let locales = &settings.identity.locales;
        let profiles: Vec<(String, String)> = settings
            .identity
            .user_agents
            .iter()
            .enumerate()
            .map(|(i, ua)| {
                let locale = locales
                    .get(i % locales.len().max(1))
                    .cloned()
                    .unwrap_or_else(|| "en-US".to_string());
                (ua.clone(), locale)
            })
            .collect();

        let mut slots = Vec::with_capacity(egress_options.len() * profiles.len());
        for (e, egress) in egress_options.iter().enumerate() {
            for (p, (user_agent, locale)) in profiles.iter().enumerate() {
                slots.push(Identity::new(
                    egress.clone(),
                    user_agent,
                    locale,
                    format!("egress-{e}/profile-{p}"),
                ));
            }
        }

        debug!("Identity pool built with {} slot(s)", slots.len());

        Self {
            slots,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build a pool from explicit identities.
    pub fn from_identities(slots: Vec<Identity>) -> Self {
        Self {
            slots,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of slots in rotation
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool has no slots at all
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for RotatingIdentityPool {
    async fn acquire(&self) -> Result<Identity> {
        if self.slots.is_empty() {
            return Err(crate::Error::identity_unavailable(
                "identity pool has no slots",
            ));
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let identity = self.slots[index].clone();
        debug!("Acquired identity {}", identity.label());
        Ok(identity)
    }
}
