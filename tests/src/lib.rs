//! Integration and property tests for the RSP translator crates.

#![cfg(test)]

mod backend;
mod decode;
mod frontend;
mod interp;
mod scheduler;
