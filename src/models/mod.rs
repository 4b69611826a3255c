pub mod address;
pub mod buyer;
pub mod order;
pub mod payment;
pub mod session;

pub use address::{Address, NewAddress};
pub use buyer::Buyer;
pub use order::{CheckoutDecline, CheckoutRequest, Order};
pub use payment::{CardDetails, PaymentMethod};
pub use session::{CheckoutSession, SavedCard, ShippingSelection};
