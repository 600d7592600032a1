pub mod connection_table;
pub mod header;
pub mod process_table;
pub mod status_bar;
