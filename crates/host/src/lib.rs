// firedoc-host library
// Privileged side of the viewer: file access, dialogs, window lifecycle

// Bridge dispatch and transport
pub mod bridge;
pub mod ws;

// File service and its dialogs
pub mod dialog;
pub mod service;

// Close and navigation policy
pub mod guard;
pub mod window;

// Configuration
pub mod config;
