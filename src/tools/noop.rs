//! Stand-in tools for runs without the external binaries

use super::traits::{BagGenerator, XmlFormatter};
use async_trait::async_trait;
use std::path::PathBuf;

/// Bag generator used when no export command is available
///
/// Every call fails with `Error::NotSupported`, so only records whose
/// metadata ships inside their container can be converted.
pub struct NoOpBagGenerator;

#[async_trait]
impl BagGenerator for NoOpBagGenerator {
    async fn generate(&self, _identifier: &str) -> crate::Result<PathBuf> {
        Err(crate::Error::NotSupported(
            "Bag generation requires an external export command. \
             Configure tools.bag_generator_program or ensure drush is in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Formatter that returns documents unchanged
pub struct PassthroughFormatter;

#[async_trait]
impl XmlFormatter for PassthroughFormatter {
    async fn format(&self, xml: String) -> crate::Result<String> {
        Ok(xml)
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}
