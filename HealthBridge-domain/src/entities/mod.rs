// Request and response entities for the domain services
pub mod appointments;
pub mod billing;
pub mod consultations;
pub mod learning;
pub mod monitoring;
pub mod policies;
pub mod surveys;
pub mod sync;
pub mod users;
pub mod wellness;

pub use appointments::*;
pub use billing::*;
pub use consultations::*;
pub use learning::*;
pub use monitoring::*;
pub use policies::*;
pub use surveys::*;
pub use sync::*;
pub use users::*;
pub use wellness::*;
