pub mod aws_clients;
pub mod config;
pub mod describe;
pub mod domain;
pub mod drivers;
pub mod errors;
pub mod fetch;
pub mod inspect;
pub mod models;
pub mod openai;
pub mod pacing;
pub mod reconciler;
pub mod repositories;
pub mod startup;
pub mod storage;
