pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod metadata;
pub mod output;
pub mod parsers;
pub mod repository;
pub mod tabular;
pub mod uploader;
