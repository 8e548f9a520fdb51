pub mod database;
pub mod relation;
pub mod table_data;
pub mod table_schema;
