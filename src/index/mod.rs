pub mod rows;
pub mod field_catalog;
pub mod back_index;
pub mod analyze;
pub mod merge;
