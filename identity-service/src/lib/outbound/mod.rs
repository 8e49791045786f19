pub mod repositories;
pub mod store;
pub mod token;
