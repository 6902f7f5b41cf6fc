pub mod export;
pub mod group;
pub mod jobs;
pub mod register;
pub mod resolve;
pub mod results;
pub mod setup;
pub mod submit;
