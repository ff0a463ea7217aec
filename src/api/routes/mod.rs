//! API Routes
//!
//! Route handlers organized by functionality. Board actions are not HTTP
//! routes; they travel over `/ws`.

pub mod health;
