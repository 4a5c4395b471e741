pub mod command_reader;
pub mod customer_reader;
pub mod limit_writer;
