//! Testing utilities for Linkweave.
//!
//! Mocks of the core ports, scripted fakes, record builders and assertion
//! helpers shared by the unit and scenario tests.

pub mod assertions;
pub mod builders;
pub mod implementations;
pub mod mocks;

/// Re-export commonly used types for convenience
pub use mockall;

pub use assertions::{assert_created_before, assert_no_value_lost, assert_valid_order};
pub use builders::RecordBuilder;
pub use implementations::{CollectingEventHandler, ScriptedCreationClient};
pub use mocks::{MockClient, MockEventHandler, MockPersistence};
