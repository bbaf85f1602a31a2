//! sqlpreview CLI - Command-line interface and GitHub Action entry point.
//!
//! This crate wires the preview engine to its environment: argument and
//! configuration parsing, pull request detection, styled output, logging
//! and step outputs.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
