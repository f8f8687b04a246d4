//! CSV adapters used by the command-line driver.

pub mod command_reader;
pub mod work_item_writer;
