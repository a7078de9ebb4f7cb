pub mod config;
pub mod database;

pub use config::SaveChangesConfig;
pub use database::DocumentDatabase;
