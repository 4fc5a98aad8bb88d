//! Roam - a keyboard-driven, vim-like browser shell

pub mod channel;
pub mod chrome;
pub mod clipboard;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod key;
pub mod keymap;
pub mod logging;
pub mod mode;
pub mod notification;
pub mod prompt;
pub mod protocol;
pub mod transport;
pub mod ui;
pub mod view;
pub mod worker;

#[cfg(test)]
mod test_utils;
