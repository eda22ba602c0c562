//! Request handlers, grouped by flow.

pub mod checkout;
pub mod orders;
pub mod quote;
