//! ChurnGuard Features
//!
//! Turns validated customer records into fixed-width numeric feature vectors.
//!
//! The [`Encoder`] fits a [`FeatureManifest`] once per training run and then
//! only ever applies it. Binary fields become one 0/1 column, multi-category
//! fields become one-hot indicator columns, numeric fields pass through. The
//! manifest is fingerprinted so that models can be paired with the exact
//! layout they were trained on.

pub mod encoder;
pub mod manifest;

pub use encoder::{Encoder, EncoderConfig};
pub use manifest::{ColumnDescriptor, ColumnEncoding, FeatureManifest, MANIFEST_FORMAT_VERSION};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::encoder::{Encoder, EncoderConfig};
    pub use crate::manifest::{ColumnDescriptor, FeatureManifest};
}
