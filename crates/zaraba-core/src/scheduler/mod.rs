pub mod jobs;
mod service;

pub use service::{JobContext, JobHandler, JobRunner, Schedule};
