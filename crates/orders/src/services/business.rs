//! Business settings trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{BusinessId, ShippingZoneId};
use domain::{Business, PaymentMethod, ShippingZone};
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// Read access to the business settings that affect pricing and payment.
#[async_trait]
pub trait BusinessDirectory: Send + Sync {
    async fn get_business(&self, business_id: BusinessId) -> Result<Option<Business>>;

    /// Returns the zone if it belongs to the business.
    async fn get_shipping_zone(
        &self,
        business_id: BusinessId,
        zone_id: ShippingZoneId,
    ) -> Result<Option<ShippingZone>>;

    async fn is_payment_method_enabled(
        &self,
        business_id: BusinessId,
        method: PaymentMethod,
    ) -> Result<bool>;
}

#[derive(Debug, Default)]
struct InMemoryBusinessState {
    businesses: HashMap<BusinessId, Business>,
    zones: HashMap<ShippingZoneId, ShippingZone>,
    disabled_methods: HashSet<(BusinessId, PaymentMethod)>,
    fail_on_lookup: bool,
}

/// In-memory business directory for tests and local runs.
///
/// Every payment method is enabled unless explicitly disabled.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBusinessDirectory {
    state: Arc<RwLock<InMemoryBusinessState>>,
}

impl InMemoryBusinessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_business(&self, business: Business) {
        self.state
            .write()
            .await
            .businesses
            .insert(business.id, business);
    }

    pub async fn add_shipping_zone(&self, zone: ShippingZone) {
        self.state.write().await.zones.insert(zone.id, zone);
    }

    pub async fn disable_payment_method(&self, business_id: BusinessId, method: PaymentMethod) {
        self.state
            .write()
            .await
            .disabled_methods
            .insert((business_id, method));
    }

    /// Configures every lookup to fail.
    pub async fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().await.fail_on_lookup = fail;
    }
}

#[async_trait]
impl BusinessDirectory for InMemoryBusinessDirectory {
    async fn get_business(&self, business_id: BusinessId) -> Result<Option<Business>> {
        let state = self.state.read().await;
        if state.fail_on_lookup {
            return Err(ServiceError::collaborator("business", "lookup failed"));
        }
        Ok(state.businesses.get(&business_id).cloned())
    }

    async fn get_shipping_zone(
        &self,
        business_id: BusinessId,
        zone_id: ShippingZoneId,
    ) -> Result<Option<ShippingZone>> {
        let state = self.state.read().await;
        if state.fail_on_lookup {
            return Err(ServiceError::collaborator("business", "lookup failed"));
        }
        Ok(state
            .zones
            .get(&zone_id)
            .filter(|z| z.business_id == business_id)
            .cloned())
    }

    async fn is_payment_method_enabled(
        &self,
        business_id: BusinessId,
        method: PaymentMethod,
    ) -> Result<bool> {
        let state = self.state.read().await;
        if state.fail_on_lookup {
            return Err(ServiceError::collaborator("business", "lookup failed"));
        }
        Ok(!state.disabled_methods.contains(&(business_id, method)))
    }
}
