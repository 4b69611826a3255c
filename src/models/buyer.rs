use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The authenticated buyer, as resolved by the identity collaborator.
/// Used for keying the checkout session and read-only display (e.g. the
/// confirmation email shown on the final step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Buyer {
    pub id: Uuid,
    pub email: String,
}
