pub mod annotation;
pub mod annotator;
pub mod app;
pub mod config;
pub mod correction;
pub mod domain;
pub mod error;
pub mod gpr;
pub mod model;
pub mod output;
pub mod registry;
