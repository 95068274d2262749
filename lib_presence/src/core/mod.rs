pub mod change_detector;
pub mod engine;
pub mod ingestion;
pub mod locations;
pub mod watchdog;
