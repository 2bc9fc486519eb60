//! Workflow execution engine for Nodeflow.
//!
//! This crate holds the engine and the "ports" (repository and collaborator
//! traits) the infrastructure layer implements. It depends only on
//! `nodeflow-types` -- never on `nodeflow-infra` or any database/IO crate.

pub mod audit;
pub mod engine;
pub mod expression;
pub mod node;
pub mod repository;
pub mod service;
pub mod strategy;
pub mod workflow;

#[cfg(test)]
mod test_support;
