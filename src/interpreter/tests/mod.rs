//! Tests for the interpreter
//!
//! Organized by feature area

mod basic_tests;
mod context_tests;
mod helpers;
mod table_tests;
