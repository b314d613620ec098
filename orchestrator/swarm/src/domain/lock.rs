// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Leased Resource Locks
//!
//! - [`ResourceKey`]: identifier of an infrastructure target that must be
//!   mutated by one holder at a time (a VLAN, a firewall rule set, a
//!   deployment slot).
//! - [`HolderId`]: identity of the process/intent holding a lease.
//! - [`LockLease`]: value object describing a granted lease.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of an external infrastructure target requiring mutual exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of a lease holder.
///
/// By convention `<node id>/<intent id>`, so the coordination server can tell
/// which machine owns a lease when it has to be investigated by hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    pub fn new(holder: impl Into<String>) -> Self {
        Self(holder.into())
    }

    /// Holder identity for a unit of work running on `node_id`.
    pub fn for_work(node_id: &str, work_id: impl fmt::Display) -> Self {
        Self(format!("{}/{}", node_id, work_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A granted lease on a [`ResourceKey`].
///
/// Only one holder may own a lease for a given key at any instant. The lease
/// lapses `ttl` after the last successful acquire/renew unless renewed again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLease {
    pub resource_key: ResourceKey,
    pub holder: HolderId,
    #[serde(with = "ttl_millis")]
    pub ttl: Duration,
    pub granted_at: DateTime<Utc>,
}

impl LockLease {
    pub fn new(resource_key: ResourceKey, holder: HolderId, ttl: Duration) -> Self {
        Self {
            resource_key,
            holder,
            ttl,
            granted_at: Utc::now(),
        }
    }

    /// Interval at which a well-behaved holder renews the lease.
    pub fn renewal_interval(&self) -> Duration {
        renewal_interval(self.ttl)
    }
}

/// Renew three times per TTL so a single delayed renewal does not lose the lease.
pub fn renewal_interval(ttl: Duration) -> Duration {
    (ttl / 3).max(Duration::from_millis(1))
}

mod ttl_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(ttl.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_for_work() {
        let holder = HolderId::for_work("node-a", "1234");
        assert_eq!(holder.as_str(), "node-a/1234");
    }

    #[test]
    fn test_renewal_interval_is_a_third_of_ttl() {
        assert_eq!(renewal_interval(Duration::from_secs(30)), Duration::from_secs(10));
        assert_eq!(renewal_interval(Duration::ZERO), Duration::from_millis(1));
    }

    #[test]
    fn test_lease_serializes_ttl_as_millis() {
        let lease = LockLease::new("vlan-10".into(), HolderId::new("n/1"), Duration::from_secs(2));
        let json = serde_json::to_value(&lease).unwrap();
        assert_eq!(json["ttl"], 2000);
        assert_eq!(json["resource_key"], "vlan-10");
    }
}
