//! Concrete gateway implementations

pub mod midtrans;

pub use midtrans::{MidtransConfig, MidtransGateway};
