mod common;
mod components_tests;
mod history_tests;
mod status_tests;
mod sync_tests;
