//! Reference data loaded at startup.
//!
//! Businesses, customers and shipping zones are owned by other services; a
//! deployment points `SEED_FILE` at a JSON export of them so the in-process
//! directories can answer lookups. Variants are written to the order store.

use std::path::{Path, PathBuf};

use domain::{Business, Customer, CustomerAddress, ShippingZone, Variant};
use orders::{InMemoryBusinessDirectory, InMemoryCustomerDirectory};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Contents of a seed file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub businesses: Vec<Business>,
    pub shipping_zones: Vec<ShippingZone>,
    pub customers: Vec<Customer>,
    pub addresses: Vec<CustomerAddress>,
    pub variants: Vec<Variant>,
}

impl SeedData {
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.businesses.is_empty() && self.customers.is_empty() && self.variants.is_empty()
    }

    /// Fills the directories with the seeded businesses, zones, customers
    /// and addresses.
    pub async fn populate(
        &self,
        customers: &InMemoryCustomerDirectory,
        businesses: &InMemoryBusinessDirectory,
    ) {
        for business in &self.businesses {
            businesses.add_business(business.clone()).await;
        }
        for zone in &self.shipping_zones {
            businesses.add_shipping_zone(zone.clone()).await;
        }
        for customer in &self.customers {
            customers.add_customer(customer.clone()).await;
        }
        for address in &self.addresses {
            customers.add_address(address.clone()).await;
        }
        tracing::info!(
            businesses = self.businesses.len(),
            shipping_zones = self.shipping_zones.len(),
            customers = self.customers.len(),
            addresses = self.addresses.len(),
            "directories seeded"
        );
    }
}
