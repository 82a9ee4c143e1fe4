pub mod job;
pub mod report;
pub mod run;
