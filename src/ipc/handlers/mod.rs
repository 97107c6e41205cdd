pub mod core;
pub mod marks;
pub mod results;
pub mod setup;
pub mod students;
