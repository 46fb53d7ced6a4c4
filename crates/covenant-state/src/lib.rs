//! # Covenant State
//!
//! Session state for the contract engine: the blueprint template store, the
//! contract registry, offer generation, save games and rehydration of saved
//! contracts against the store.

pub mod offers;
pub mod persistence;
pub mod registry;
pub mod rehydrate;
pub mod templates;

pub use offers::{is_offerable, OfferCounts};
pub use persistence::{InMemorySaveStore, JsonFileStore, SaveGame, SaveStore, SAVE_VERSION};
pub use registry::{ContractFilter, Registry, RestoreReport, TickReport};
pub use rehydrate::rehydrate;
pub use templates::{BlueprintStore, LoadReport};
