pub mod conflict;
pub mod entities;
pub mod value_objects;
