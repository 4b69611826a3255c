pub mod address_step;
pub mod confirmation;
pub mod payment_step;
pub mod shipping;

pub use address_step::{AddressStepService, AddressStepView};
pub use confirmation::{
    ConfirmationEntry, ConfirmationService, ConfirmationState, ConfirmationSummary, NextStep,
    PlacementResult,
};
pub use payment_step::{AddMethodOutcome, PaymentStepService, PaymentStepView};
pub use shipping::{shipping_methods, ShippingOption};
