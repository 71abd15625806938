// HealthBridge-api lib.rs
//
// HTTP layer for the HealthBridge Namibia platform: router, handlers,
// configuration and the OpenAPI document.

// Public modules
pub mod api;
pub mod config;
pub mod entities;
pub mod openapi;
