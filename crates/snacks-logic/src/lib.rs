//! Pure life-support cycle logic for Snacks.
//!
//! This crate holds the resource economy with no ECS, persistence or host
//! dependency: functions and types take plain data, making them unit-testable
//! and usable from the session engine, the headless harness or a host plugin.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Lenient JSON loading of settings and processor definitions |
//! | [`constants`] | Resource names, tolerances, default timings |
//! | [`ledger`] | Resource containers pooled per resource name |
//! | [`processor`] | Cycle timer, whole-cycle catch-up, per-cycle results |
//! | [`result`] | Per-resource consumption/production records |
//! | [`rule`] | Input/output rules, demand, related-resource throttling |
//! | [`settings`] | Player settings and the built-in Snacks processor |

pub mod config;
pub mod constants;
pub mod ledger;
pub mod processor;
pub mod result;
pub mod rule;
pub mod settings;
