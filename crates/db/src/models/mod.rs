//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus a `Deserialize` create DTO where rows are
//! inserted through the API.

pub mod category;
pub mod image;
pub mod model;
