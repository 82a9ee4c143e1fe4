pub mod aggregator;
pub mod job_cache;
pub mod normalizer;
pub mod runner;
pub mod schedule_actor;
pub mod template;
