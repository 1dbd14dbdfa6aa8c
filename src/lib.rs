pub mod action;
pub mod autoplay;
pub mod board;
pub mod config;
pub mod error;
pub mod game;
pub mod logging;
pub mod planner;
pub mod vision;
