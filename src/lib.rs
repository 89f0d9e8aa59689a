pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod services;
pub mod statement_parsing;
