//! Incremental translation of CORBA IDL files into Java sources.
//!
//! A run resolves one IDL compiler backend, finds the IDL files whose
//! markers are missing or out of date, and hands each one to the compiler.

pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod invoker;
pub mod locator;
pub mod stale;
pub mod workspace;

pub use error::{Error, Result};
