//! Fake implementations of the core ports for scenario tests.

mod collecting_events;
mod scripted_client;

pub use collecting_events::CollectingEventHandler;
pub use scripted_client::ScriptedCreationClient;
