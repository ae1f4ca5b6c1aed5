pub mod care_plan;
pub mod order;
pub mod patient;
pub mod provider;

pub use care_plan::*;
pub use order::*;
pub use patient::*;
pub use provider::*;
