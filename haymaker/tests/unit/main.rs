//! Integration tests for the haymaker core

mod common;
mod test_driver;
mod test_install;
mod test_locator;
mod test_registry;
mod test_state_store;
