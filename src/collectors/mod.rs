//! Host-facing collection pieces: probing, planning, execution and the
//! system inventory listings.

pub mod executor;
pub mod identity;
pub mod inventory;
pub mod planner;
pub mod probe;
pub mod runner;
pub mod target;
