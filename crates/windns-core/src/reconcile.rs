//! Address-set reconciliation
//!
//! Computes which addresses must be removed and which added when a record
//! set's desired addresses change. Addresses compare by their canonical IP
//! form when they parse as IP literals (so `::ffff:10.0.0.1` equals
//! `10.0.0.1`), and by raw text otherwise.

use std::collections::BTreeMap;
use std::net::IpAddr;

/// Canonical comparison key for an address string
pub fn canonical_address(address: &str) -> String {
    match address.trim().parse::<IpAddr>() {
        Ok(ip) => ip.to_canonical().to_string(),
        Err(_) => address.to_string(),
    }
}

/// Result of reconciling two address sets
///
/// Both lists are sorted by canonical key, so repeated runs issue the same
/// sub-operations in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Addresses in the old set but not the new one (old spelling)
    pub remove: Vec<String>,
    /// Addresses in the new set but not the old one (new spelling)
    pub add: Vec<String>,
}

impl ReconcilePlan {
    /// Whether nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Compute `remove = old − new` and `add = new − old`
///
/// Duplicate spellings of one address within a set collapse to the first
/// occurrence.
pub fn reconcile<O, N>(old: O, new: N) -> ReconcilePlan
where
    O: IntoIterator,
    O::Item: AsRef<str>,
    N: IntoIterator,
    N::Item: AsRef<str>,
{
    let old = keyed(old);
    let new = keyed(new);

    ReconcilePlan {
        remove: old
            .iter()
            .filter(|(key, _)| !new.contains_key(*key))
            .map(|(_, raw)| raw.clone())
            .collect(),
        add: new
            .iter()
            .filter(|(key, _)| !old.contains_key(*key))
            .map(|(_, raw)| raw.clone())
            .collect(),
    }
}

/// Canonical, de-duplicated and sorted form of an address list
pub fn normalize<I>(addresses: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    keyed(addresses).into_keys().collect()
}

/// De-duplicated address list in the caller's spelling, sorted by canonical key
pub fn unique<I>(addresses: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    keyed(addresses).into_values().collect()
}

fn keyed<I>(addresses: I) -> BTreeMap<String, String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut map = BTreeMap::new();
    for address in addresses {
        let raw = address.as_ref();
        map.entry(canonical_address(raw))
            .or_insert_with(|| raw.to_string());
    }
    map
}
