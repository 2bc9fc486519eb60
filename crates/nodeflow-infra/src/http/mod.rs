//! Outbound HTTP request strategies.

pub mod rest;
