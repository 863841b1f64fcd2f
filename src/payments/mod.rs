//! Payment gateway integration
//!
//! A single trait, [`PaymentGateway`], covers checkout creation, notification
//! signature checks and status polling. Midtrans (Snap + Core API) is the
//! production implementation.

pub mod providers;
pub mod traits;
pub mod types;

pub use providers::{MidtransConfig, MidtransGateway};
pub use traits::PaymentGateway;
