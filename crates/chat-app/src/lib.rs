pub mod accounts;
pub mod app;
pub mod chat;
pub mod cli;
pub mod error;
pub mod settings;
pub mod terminal;
pub mod tools;
pub mod translate;

pub use app::run;
pub use error::{AppError, AppResult};
