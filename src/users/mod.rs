//! User accounts: persistence and lifecycle workflows

pub mod memory;
pub mod repository;
pub mod service;

pub use memory::InMemoryUserRepository;
pub use repository::{PgUserRepository, RepositoryError, UserRepository};
pub use service::{RegistrationUploads, UserService};
