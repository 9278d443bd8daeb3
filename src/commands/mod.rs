pub mod batch;
pub mod improvement;
pub mod report;
pub mod table;
