//! # propdesk
//!
//! Client core for a property-listing API: session persistence, the
//! request gateway every API call goes through, and the route guard that
//! decides which pages a navigation may reach.
//!
//! The `propdesk` binary serves page assets behind the route guard; the
//! `propdesk-cli` package drives the auth and property flows from a
//! terminal on top of this library.

pub mod config;
pub mod form;
pub mod gateway;
pub mod guard;
pub mod routes;
pub mod services;
pub mod session;
