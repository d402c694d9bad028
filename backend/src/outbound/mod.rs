//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! This module follows the hexagonal architecture pattern, providing concrete
//! implementations of the unit of work and repository ports:
//!
//! - **memory**: process-local transactional store with emulated row locks
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. Apart from the storage rules the
//! repository ports name explicitly, they contain no business logic.

pub mod memory;
pub mod persistence;
