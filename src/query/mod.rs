pub mod handlers;
pub mod queries;
pub mod read_model;
