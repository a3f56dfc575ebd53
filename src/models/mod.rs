pub mod person;
pub mod adoption;
pub mod contract;
pub mod job_offer;
pub mod job_application;
pub mod conversation;
pub mod history;

pub use person::*;
pub use adoption::*;
pub use contract::*;
pub use job_offer::*;
pub use job_application::*;
pub use conversation::*;
pub use history::*;
