//! Retrolaunch launcher
//!
//! Headless front end for the core host: reads the persistent launcher
//! configuration, launches a core with the requested content and writes the
//! outputs it was asked for (screenshot, save state, battery save) to disk.

pub mod config;
pub mod run;
