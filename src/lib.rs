pub mod clarity;
pub mod clients;
pub mod config;
pub mod context;
pub mod disclosure;
pub mod error;
pub mod evidence;
pub mod goals;
pub mod ingest;
pub mod orchestrator;
pub mod producers;
pub mod prompts;
pub mod session;
pub mod turn;

pub use config::Config;
pub use disclosure::DisclosureLayer;
pub use error::{ClarityMindError, Result};
pub use orchestrator::{Orchestrator, TurnKind, TurnOutcome};
pub use session::Session;
pub use turn::TurnRequest;
