use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A saved shipping address, owned by the address backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub address_id: Uuid,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Fields for creating a new saved address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub notes: Option<String>,
}
