use serde::{Deserialize, Serialize};

use super::ServiceSnapshot;

/// Live catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceItem {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub base_price: i64,
    pub category: String,
    pub active: bool,
}

impl ServiceItem {
    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            name: self.name.clone(),
            icon: self.icon.clone(),
            price: self.base_price,
            category: self.category.clone(),
        }
    }
}
