pub mod context;
pub mod error;
pub mod handlers;
pub mod provider;
pub mod registration;
pub mod registry;
pub mod selection;

pub use context::AppContext;
pub use error::AppError;
pub use registry::{CapabilityRegistry, RegistryBuilder};
pub use selection::SelectionRule;
