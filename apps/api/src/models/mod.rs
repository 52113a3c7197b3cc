pub mod job;
pub mod version;
