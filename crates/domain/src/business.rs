//! Records owned by neighbouring domains that the order core reads.

use common::{AddressId, BusinessId, CustomerId, ShippingZoneId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Tenant settings relevant to pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    /// ISO currency code every order of this business is recorded in.
    pub currency: String,
    /// VAT rate as a fraction, e.g. `0.15`.
    pub vat_rate: Decimal,
}

/// A delivery region with a flat cost and optional free-shipping threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: ShippingZoneId,
    pub business_id: BusinessId,
    pub name: String,
    pub currency: String,
    /// Upper-case ISO country codes covered by this zone.
    pub countries: Vec<String>,
    pub cost: Money,
    /// Zero disables free shipping.
    pub free_threshold: Money,
}

impl ShippingZone {
    /// Returns true if the zone delivers to `country_code`.
    pub fn covers(&self, country_code: &str) -> bool {
        let code = normalize_country(country_code);
        !code.is_empty() && self.countries.iter().any(|c| normalize_country(c) == code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub business_id: BusinessId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAddress {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub country_code: String,
}

impl CustomerAddress {
    /// Trimmed, upper-case country code.
    pub fn country(&self) -> String {
        normalize_country(&self.country_code)
    }
}

fn normalize_country(code: &str) -> String {
    code.trim().to_uppercase()
}
