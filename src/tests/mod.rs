//! Scenario tests for the server binary.
//!
//! Unit tests live next to the code they cover; these exercise the provider,
//! the renderer and the command line together through the public library API.
