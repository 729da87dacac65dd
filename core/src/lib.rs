pub mod backend;
pub mod calendar;
pub mod db;
pub mod derive;
pub mod error;
pub mod migrate;
pub mod models;
pub mod service;
pub mod store;

pub use backend::{KeyValueStore, MemoryStorage};
pub use error::{StoreError, StoreResult};
pub use models::{Day, MealEntry, MealSlot, PlannedRange, Settings};
pub use service::{CopyMode, Tracker};
pub use store::Store;
