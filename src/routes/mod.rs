pub mod auth;
pub mod user;
pub mod file_upload;
pub mod favorites;
pub mod adoption;
pub mod contract;
pub mod job_offer;
pub mod job_application;
pub mod conversation;
pub mod history;
