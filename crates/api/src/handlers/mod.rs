pub mod catalog;
pub mod images;
pub mod queue;
