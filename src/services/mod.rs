pub mod camera;
pub mod context;
pub mod frame_analyzer;
pub mod job_store;
pub mod scan_loop;
pub mod trust_client;
pub mod verification;
