pub mod db;
pub mod matcher;
pub mod models;
pub mod planner;
pub mod seed;
pub mod service;
pub mod shopping;
pub mod store;
pub mod suggest;
