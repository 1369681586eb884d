//! Stitchkit - photo to stitch pattern client
//!
//! Sends a photo with colour-count and print-size parameters to a remote
//! transformation service and exports the returned pattern image.
//! This library exposes modules for integration testing.

pub mod error;
pub mod models;
pub mod services;
