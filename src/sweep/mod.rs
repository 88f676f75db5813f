pub mod audit;
pub mod command_source;
pub mod config;
pub mod driver;
pub mod hasher;
pub mod ledger;
pub mod paths;
pub mod reconcile;
pub mod session;
pub mod source;
pub mod util;
pub mod warn;
pub mod watcher;
