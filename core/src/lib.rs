pub mod backup;
pub mod clock;
pub mod gate;
pub mod models;
pub mod progress;
pub mod service;
pub mod storage;
pub mod store;
pub mod upload;
