pub mod anchor;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod family;
pub mod merge;
pub mod message;
pub mod report;
pub mod source;
pub mod trace;
pub mod window;
