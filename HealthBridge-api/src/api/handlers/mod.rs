pub mod appointments;
pub mod auth;
pub mod billing;
pub mod consultations;
pub mod health;
pub mod learning;
pub mod monitoring;
pub mod policies;
pub mod surveys;
pub mod sync;
pub mod users;
pub mod wellness;

pub use health::health_check;
