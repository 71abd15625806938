// HealthBridge Domain
// This crate contains the business logic for the HealthBridge application

// Services that implement business logic
pub mod services;

// Authentication and authorization
pub mod auth;

// Field-level encryption for clinical data
pub mod crypto;

// Relationship-based access rules
pub mod access;

// Service error type
pub mod errors;

// Request and response entities used by the services
pub mod entities;

// Health checks and system status
pub mod health;

// Re-export the data layer modules for convenience
pub use health_bridge_data::{database, models};

pub use errors::ServiceError;

// Testing utilities - only available with mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;
