pub mod response;
pub mod time;
pub mod validation;

pub use response::*;
pub use time::*;
pub use validation::*;
