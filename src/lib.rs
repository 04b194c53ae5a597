#![allow(incomplete_features)]
#![feature(generic_const_exprs)]

pub mod config;
pub mod datasets;
pub mod error;
pub mod evaluate;
pub mod loader;
pub mod model;
pub mod train;
pub mod transform;
pub mod workflow;

pub use error::{Error, Result};
