pub mod accounts;
pub mod auth;
pub mod iban;
pub mod pipeline;
pub mod statements;
