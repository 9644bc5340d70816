//! A-record sets
//!
//! A record set is every A record for one name in one zone. The
//! [`RecordSetManager`] maps set-level lifecycle calls onto per-address
//! facade operations:
//!
//! | call     | sub-operations                                          |
//! |----------|---------------------------------------------------------|
//! | create   | one add per address, then read                          |
//! | read     | one read (any address)                                  |
//! | update   | reconcile; deletes first, then adds; then read          |
//! | delete   | one delete per address                                  |
//!
//! Sub-operations run sequentially in sorted order and stop at the first
//! failure. Nothing is rolled back: the returned
//! [`Error::PartiallyApplied`] lists what was already changed.

use crate::client::RecordClient;
use crate::error::{AddressChange, Error, Result};
use crate::fqdn;
use crate::reconcile::{self, ReconcilePlan};
use crate::record::{AddARecordOptions, DeleteARecordOptions, ReadARecordOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default TTL for record sets, in seconds
pub const DEFAULT_RECORD_SET_TTL: i64 = 3600;

fn default_ttl() -> i64 {
    DEFAULT_RECORD_SET_TTL
}

/// Desired state of an A-record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSetSpec {
    /// Fully qualified zone name (e.g., "example.com.")
    pub zone: String,
    /// Record name relative to the zone (e.g., "www")
    pub name: String,
    /// TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl: i64,
    /// Desired addresses
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl RecordSetSpec {
    /// Desired state with the default TTL and no addresses
    pub fn new(zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
            ttl: DEFAULT_RECORD_SET_TTL,
            addresses: Vec::new(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the desired addresses
    pub fn with_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Identifier of the set: its fully qualified name
    pub fn id(&self) -> String {
        format!("{}.{}", self.name, self.zone)
    }

    /// Validate zone and name
    pub fn validate(&self) -> Result<()> {
        fqdn::validate_zone(&self.zone)?;
        fqdn::validate_name(&self.name)?;
        Ok(())
    }
}

/// Observed state of an A-record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSetState {
    /// Current addresses, de-duplicated and sorted
    pub addresses: Vec<String>,
    /// Representative TTL: the minimum across the set's records
    pub ttl: u32,
}

/// Lifecycle operations over A-record sets
#[derive(Debug)]
pub struct RecordSetManager {
    client: RecordClient,
}

impl RecordSetManager {
    /// Create a manager over a record client
    pub fn new(client: RecordClient) -> Self {
        Self { client }
    }

    /// The underlying record client
    pub fn client(&self) -> &RecordClient {
        &self.client
    }

    /// Create every address in `spec`, then read the set back
    pub async fn create(&self, spec: &RecordSetSpec) -> Result<Option<RecordSetState>> {
        spec.validate()?;
        let addresses = reconcile::unique(&spec.addresses);
        info!("Creating record set {} with {} address(es)", spec.id(), addresses.len());

        let mut applied = Vec::new();
        for address in addresses {
            self.add(spec, &address)
                .await
                .map_err(|e| partial("create", &applied, &address, e))?;
            applied.push(AddressChange::Added(address));
        }

        self.read(&spec.zone, &spec.name).await
    }

    /// Read the current state of a set
    ///
    /// Returns `Ok(None)` when the remote reports no such record or returns
    /// no records.
    pub async fn read(&self, zone: &str, name: &str) -> Result<Option<RecordSetState>> {
        let response = match self
            .client
            .read_a_record(ReadARecordOptions {
                name: name.to_string(),
                zone_name: zone.to_string(),
                address: None,
            })
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                debug!("Record set {}.{} not found", name, zone);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(ttl) = response.min_ttl() else {
            debug!("Record set {}.{} has no records", name, zone);
            return Ok(None);
        };

        Ok(Some(RecordSetState {
            addresses: reconcile::unique(response.addresses()),
            ttl,
        }))
    }

    /// Move a set from `previous` addresses to `spec.addresses`
    ///
    /// Removals are issued before additions. When the two sets are equal
    /// nothing is sent and the set is only read back.
    pub async fn update(
        &self,
        previous: &[String],
        spec: &RecordSetSpec,
    ) -> Result<Option<RecordSetState>> {
        spec.validate()?;
        let plan = reconcile::reconcile(previous, &spec.addresses);

        if plan.is_empty() {
            debug!("Record set {} addresses unchanged", spec.id());
        } else {
            self.apply(spec, &plan).await?;
        }

        self.read(&spec.zone, &spec.name).await
    }

    /// Delete every address in `spec`
    pub async fn delete(&self, spec: &RecordSetSpec) -> Result<()> {
        spec.validate()?;
        let addresses = reconcile::unique(&spec.addresses);
        info!("Deleting record set {} ({} address(es))", spec.id(), addresses.len());

        let mut applied = Vec::new();
        for address in addresses {
            self.remove(spec, &address)
                .await
                .map_err(|e| partial("delete", &applied, &address, e))?;
            applied.push(AddressChange::Removed(address));
        }

        Ok(())
    }

    async fn apply(&self, spec: &RecordSetSpec, plan: &ReconcilePlan) -> Result<()> {
        info!(
            "Updating record set {}: removing {:?}, adding {:?}",
            spec.id(),
            plan.remove,
            plan.add
        );

        let mut applied = Vec::new();
        for address in &plan.remove {
            self.remove(spec, address)
                .await
                .map_err(|e| partial("update", &applied, address, e))?;
            applied.push(AddressChange::Removed(address.clone()));
        }
        for address in &plan.add {
            self.add(spec, address)
                .await
                .map_err(|e| partial("update", &applied, address, e))?;
            applied.push(AddressChange::Added(address.clone()));
        }

        Ok(())
    }

    async fn add(&self, spec: &RecordSetSpec, address: &str) -> Result<()> {
        self.client
            .add_a_record(AddARecordOptions {
                name: spec.name.clone(),
                address: address.to_string(),
                zone_name: spec.zone.clone(),
                ttl: spec.ttl,
                ..Default::default()
            })
            .await
            .map(|_| ())
    }

    async fn remove(&self, spec: &RecordSetSpec, address: &str) -> Result<()> {
        self.client
            .delete_a_record(DeleteARecordOptions {
                name: spec.name.clone(),
                address: address.to_string(),
                zone_name: spec.zone.clone(),
            })
            .await
            .map(|_| ())
    }
}

fn partial(operation: &'static str, applied: &[AddressChange], address: &str, source: Error) -> Error {
    warn!(
        "Record set {} stopped at {} after {} applied change(s): {}",
        operation,
        address,
        applied.len(),
        source
    );
    Error::PartiallyApplied {
        operation,
        applied: applied.to_vec(),
        failed_address: address.to_string(),
        source: Box::new(source),
    }
}
