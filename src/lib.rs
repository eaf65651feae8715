pub mod config;
pub mod db;
pub mod discovery;
pub mod importers;
pub mod updater;
