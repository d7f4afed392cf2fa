// Core services
pub mod agents;
pub mod catalog;
pub mod checkout;
pub mod orders;
