//! # Authentication
//!
//! Session cookies, the request extractors that guard pages and API routes,
//! and the Microsoft sign-in client.

pub mod middleware;
pub mod oauth;
pub mod session;
