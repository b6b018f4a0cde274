pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, InMemoryStore, QuoteStore, Repository, StoreError};
pub use domain::{Decimal, QuoteError, QuoteInputs, QuoteResult};
pub use engine::{compute_quote, compute_quote_exact, validate_inputs, ValidationReport};
pub use error::AppError;
pub use orchestration::Orchestrator;
