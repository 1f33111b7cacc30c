pub mod adapters;
pub mod arg;
pub mod command;
pub mod query;
pub mod run;
pub mod select;
