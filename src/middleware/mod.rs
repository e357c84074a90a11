//! Middleware

pub mod instrument;
