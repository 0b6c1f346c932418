//! Customer directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AddressId, BusinessId, CustomerId};
use domain::{Customer, CustomerAddress};
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// Read access to customers and their addresses.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Returns the customer if it exists within the business.
    async fn get_customer(
        &self,
        business_id: BusinessId,
        customer_id: CustomerId,
    ) -> Result<Option<Customer>>;

    /// Returns the address if it belongs to the customer.
    async fn get_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<Option<CustomerAddress>>;
}

#[derive(Debug, Default)]
struct InMemoryCustomerState {
    customers: HashMap<CustomerId, Customer>,
    addresses: HashMap<AddressId, CustomerAddress>,
    fail_on_lookup: bool,
}

/// In-memory customer directory for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerDirectory {
    state: Arc<RwLock<InMemoryCustomerState>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_customer(&self, customer: Customer) {
        self.state
            .write()
            .await
            .customers
            .insert(customer.id, customer);
    }

    pub async fn add_address(&self, address: CustomerAddress) {
        self.state
            .write()
            .await
            .addresses
            .insert(address.id, address);
    }

    /// Configures every lookup to fail.
    pub async fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().await.fail_on_lookup = fail;
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn get_customer(
        &self,
        business_id: BusinessId,
        customer_id: CustomerId,
    ) -> Result<Option<Customer>> {
        let state = self.state.read().await;
        if state.fail_on_lookup {
            return Err(ServiceError::collaborator("customer", "lookup failed"));
        }
        Ok(state
            .customers
            .get(&customer_id)
            .filter(|c| c.business_id == business_id)
            .cloned())
    }

    async fn get_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<Option<CustomerAddress>> {
        let state = self.state.read().await;
        if state.fail_on_lookup {
            return Err(ServiceError::collaborator("customer", "lookup failed"));
        }
        Ok(state
            .addresses
            .get(&address_id)
            .filter(|a| a.customer_id == customer_id)
            .cloned())
    }
}
