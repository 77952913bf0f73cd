pub mod frame;
pub mod job;
pub mod verification;
