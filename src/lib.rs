pub mod cli;
pub mod config;
pub mod debounce;
pub mod models;
pub mod search;
pub mod store;
pub mod utils;

pub use config::Config;
pub use debounce::Debouncer;
pub use models::{DrugResult, Item, SupplementResult, TimeOfDay};
pub use store::{ItemStore, StoreError};
pub use utils::Profile;
