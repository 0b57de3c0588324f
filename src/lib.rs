//! A library to optimize textured meshes against text prompts with score distillation

#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::excessive_precision)]

pub mod batch;
pub mod config;
pub mod dataset;
pub mod distributed;
pub mod error;
pub mod export;
pub mod function;
pub mod guidance;
pub mod optimize;
pub mod render;
pub mod scene;
pub mod schedule;
pub mod train;
pub mod validate;

#[cfg(test)]
mod mock;
