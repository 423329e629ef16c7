pub mod customer;
pub mod job;
pub mod payment;
pub mod submission;
pub mod sync;
