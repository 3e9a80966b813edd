pub mod json_repair;
pub mod safety;
pub mod sections;
