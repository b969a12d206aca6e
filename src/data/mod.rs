//! Data module for loading training images
//!
//! Provides a threaded image-directory loader exposing an
//! iterator-of-batches interface to the training loop.

mod loader;

pub use loader::{BatchIter, ImageBatchLoader};
