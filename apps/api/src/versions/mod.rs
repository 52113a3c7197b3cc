//! Document version store: ordered, immutable-once-locked versions of
//! resumes and cover letters per job, with at most one pinned version per
//! (job, kind) and job flags derived from pin state.

pub mod allocator;
pub mod flags;
pub mod handlers;
pub mod pin;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;
