//! # API Route Modules
//!
//! - `health`: status for the frontend and the orchestrator probes.
//! - `paypal`: order creation and capture with key issuance.
//! - `roblox`: purchase verification through entitlement reconciliation.
//! - `test_keys`: simulated payment, mounted only when enabled.
//! - `obfuscate`: the Lua obfuscator.
//! - `support`: customer side of the ticket desk.
//! - `admin`: dashboard login, payments, CSV export, tickets, visitors.
//! - `visitors`: public visit counter.

pub mod admin;
pub mod health;
pub mod obfuscate;
pub mod paypal;
pub mod roblox;
pub mod support;
pub mod test_keys;
pub mod visitors;
