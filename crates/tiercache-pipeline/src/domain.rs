//! Active-domain policy: a closed set of domains, at most `capacity` of
//! which are active at once, replaced first-in first-out.

use std::collections::{BTreeSet, VecDeque};

use parking_lot::RwLock;
use serde::Serialize;
use tiercache_core::config::DomainSettings;
use tiercache_core::error::{Error, Result};
use tiercache_core::types::{Domain, DomainFilter};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStatus {
    pub active: Vec<String>,
    pub available: Vec<String>,
    pub capacity: usize,
    pub inactive: Vec<String>,
}

#[derive(Debug)]
pub struct DomainRegistry {
    available: BTreeSet<Domain>,
    capacity: usize,
    initial: Vec<Domain>,
    active: RwLock<VecDeque<Domain>>,
}

impl DomainRegistry {
    /// `initial` is applied in the order given: unknown names are dropped,
    /// duplicates collapse and anything past `capacity` is cut off.
    pub fn new<A, I>(available: A, capacity: usize, initial: I) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: Into<Domain>,
        I: IntoIterator,
        I::Item: Into<Domain>,
    {
        if capacity == 0 { return Err(Error::InvalidConfig("domain capacity must be at least 1".to_string())); }
        let available: BTreeSet<Domain> = available.into_iter().map(Into::into).collect();
        if available.is_empty() { return Err(Error::InvalidConfig("no domains available".to_string())); }
        let initial: Vec<Domain> = initial.into_iter().map(Into::into).collect();
        let registry = Self { available, capacity, initial, active: RwLock::new(VecDeque::new()) };
        registry.reset_to_default();
        Ok(registry)
    }

    pub fn from_settings(settings: &DomainSettings) -> Result<Self> {
        Self::new(settings.available.iter().map(String::as_str), settings.capacity, settings.initial.iter().map(String::as_str))
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn is_available(&self, domain: &str) -> bool { self.available.contains(&Domain::new(domain)) }

    pub fn available(&self) -> impl Iterator<Item = &Domain> { self.available.iter() }

    /// Activate `name`, evicting the earliest-activated domain when full.
    /// Returns false for names outside the available set.
    pub fn activate(&self, name: &str) -> bool {
        let domain = Domain::new(name);
        if !self.available.contains(&domain) {
            warn!(domain = %domain, "refusing to activate unknown domain");
            return false;
        }
        let mut active = self.active.write();
        if active.contains(&domain) {
            debug!(domain = %domain, "domain already active");
            return true;
        }
        while active.len() >= self.capacity {
            if let Some(evicted) = active.pop_front() { info!(domain = %evicted, "domain evicted"); }
        }
        active.push_back(domain.clone());
        info!(domain = %domain, active = active.len(), capacity = self.capacity, "domain activated");
        true
    }

    pub fn deactivate(&self, name: &str) -> bool {
        let domain = Domain::new(name);
        let mut active = self.active.write();
        match active.iter().position(|d| *d == domain) {
            Some(pos) => {
                active.remove(pos);
                info!(domain = %domain, "domain deactivated");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, name: &str) -> bool { self.active.read().contains(&Domain::new(name)) }

    /// Active domains in activation order, oldest first.
    pub fn active(&self) -> Vec<Domain> { self.active.read().iter().cloned().collect() }

    pub fn status(&self) -> DomainStatus {
        let active = self.active.read();
        let mut active_names: Vec<String> = active.iter().map(|d| d.to_string()).collect();
        active_names.sort();
        DomainStatus {
            active: active_names,
            available: self.available.iter().map(|d| d.to_string()).collect(),
            capacity: self.capacity,
            inactive: self.available.iter().filter(|d| !active.contains(d)).map(|d| d.to_string()).collect(),
        }
    }

    /// Predicate for store lookups; unfiltered when nothing is active.
    pub fn filter(&self) -> DomainFilter { DomainFilter::from_domains(&self.active()) }

    /// Re-apply the initial domain set given at construction.
    pub fn reset_to_default(&self) {
        let mut chosen: VecDeque<Domain> = VecDeque::with_capacity(self.capacity);
        for d in &self.initial {
            if !self.available.contains(d) {
                warn!(domain = %d, "initial domain is not available, skipping");
                continue;
            }
            if chosen.contains(d) { continue; }
            if chosen.len() == self.capacity {
                warn!(domain = %d, capacity = self.capacity, "initial domains exceed capacity, truncating");
                break;
            }
            chosen.push_back(d.clone());
        }
        info!(active = ?chosen, "active domains reset");
        *self.active.write() = chosen;
    }
}
