pub mod database;
pub mod remote;
