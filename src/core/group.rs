// src/core/group.rs

//! Servant groups and selection policy (C3): a named group of one master
//! plus N slaves, and the policy used to pick a connection per request.

use crate::core::pool::{BackendPool, PoolStats};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A single upstream backend (a "servant" in the source material) and its
/// connection pool.
pub struct Servant {
    pub host: SocketAddr,
    pub pool: Arc<BackendPool>,
}

impl Servant {
    pub fn new(host: SocketAddr, pool_size: usize, reconnect_interval: Duration, max_reconn_count: u32) -> Self {
        Self {
            host,
            pool: BackendPool::new(host, pool_size, reconnect_interval, max_reconn_count),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPolicy {
    MasterOnly,
    ReadBalance,
}

/// Coarse, per-group ejection state: when no servant in the group is
/// usable, `auto_eject_group` takes the whole group out of rotation for
/// `group_retry_time` seconds. If `eject_after_restore` is set, the group
/// stays ejected until a manual probe restores it instead of clearing
/// automatically after the TTL.
struct EjectState {
    ejected_until: std::sync::Mutex<Option<Instant>>,
    sticky: AtomicBool,
}

/// A named collection of backends plus a selection policy.
pub struct Group {
    pub name: String,
    pub id: usize,
    pub policy: GroupPolicy,
    pub masters: Vec<Arc<Servant>>,
    pub slaves: Vec<Arc<Servant>>,
    rr_counter: AtomicUsize,
    auto_eject_group: bool,
    eject_after_restore: bool,
    group_retry_time: Duration,
    eject: EjectState,
}

impl Group {
    pub fn new(
        name: String,
        id: usize,
        policy: GroupPolicy,
        masters: Vec<Arc<Servant>>,
        slaves: Vec<Arc<Servant>>,
        auto_eject_group: bool,
        eject_after_restore: bool,
        group_retry_time: Duration,
    ) -> Self {
        Self {
            name,
            id,
            policy,
            masters,
            slaves,
            rr_counter: AtomicUsize::new(0),
            auto_eject_group,
            eject_after_restore,
            group_retry_time,
            eject: EjectState {
                ejected_until: std::sync::Mutex::new(None),
                sticky: AtomicBool::new(false),
            },
        }
    }

    pub fn master_count(&self) -> usize {
        self.masters.len()
    }

    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    fn is_ejected(&self) -> bool {
        if self.eject.sticky.load(Ordering::Relaxed) {
            return true;
        }
        match *self.eject.ejected_until.lock().unwrap() {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    /// Puts the group out of rotation, per `auto_eject_group` /
    /// `eject_after_restore`, grounded in the original's group-level TTL
    /// ejection on a failed dispatch.
    pub fn eject(&self) {
        if !self.auto_eject_group {
            return;
        }
        if self.eject_after_restore {
            self.eject.sticky.store(true, Ordering::Relaxed);
        } else {
            *self.eject.ejected_until.lock().unwrap() = Some(Instant::now() + self.group_retry_time);
        }
    }

    /// Manual admin restore (or a group-level auto-restore timer): clears
    /// ejection and re-enables every backend's pool.
    pub fn restore(&self) {
        self.eject.sticky.store(false, Ordering::Relaxed);
        *self.eject.ejected_until.lock().unwrap() = None;
        for servant in self.masters.iter().chain(self.slaves.iter()) {
            servant.pool.reenable();
        }
    }

    pub fn is_ejected_now(&self) -> bool {
        self.is_ejected()
    }

    /// Attempts to connect to the group's first master as a manual or
    /// timer-driven restore probe (§5: "a group-level auto-restore timer
    /// runs on a dedicated loop and flips the group's `enabled` flag when
    /// restoration succeeds"). On success, restores the whole group.
    pub async fn probe_restore(&self) -> bool {
        let Some(servant) = self.masters.first() else {
            return false;
        };
        match servant.pool.acquire().await {
            Ok(conn) => {
                servant.pool.release(conn).await;
                self.restore();
                true
            }
            Err(_) => false,
        }
    }

    /// Picks a usable backend per policy. `is_read` selects whether slaves
    /// may be considered under `ReadBalance`; `MasterOnly` always tries
    /// masters only, in declared order.
    pub fn find_usable_servant(&self, is_read: bool) -> Option<Arc<Servant>> {
        if self.is_ejected() {
            return None;
        }

        match self.policy {
            GroupPolicy::MasterOnly => self.masters.iter().find(|s| s.pool.is_enabled()).cloned(),
            GroupPolicy::ReadBalance if is_read => {
                let candidates: Vec<&Arc<Servant>> = self
                    .masters
                    .iter()
                    .chain(self.slaves.iter())
                    .filter(|s| s.pool.is_enabled())
                    .collect();
                if candidates.is_empty() {
                    return None;
                }
                let idx = self.rr_counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
                Some(candidates[idx].clone())
            }
            GroupPolicy::ReadBalance => self.masters.iter().find(|s| s.pool.is_enabled()).cloned(),
        }
    }
}
