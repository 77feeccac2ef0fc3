//! Traits for the external tools the pipeline drives

use async_trait::async_trait;
use std::path::PathBuf;

/// Trait for producing a fresh bag archive for one record
///
/// The bag generator is an external process that exports a record, including
/// its metadata document, into a new archive on disk.
///
/// # Examples
///
/// ```no_run
/// use foxml_inliner::tools::{BagGenerator, CliBagGenerator};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let generator = CliBagGenerator::from_path().expect("drush not found in PATH");
/// let bag = generator.generate("islandora:42").await?;
/// println!("bag written to {}", bag.display());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BagGenerator: Send + Sync {
    /// Generate a bag for `identifier` (`COLLECTION:IDENTIFIER`)
    ///
    /// # Returns
    ///
    /// The path of the archive the generator created.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The generator process cannot be started
    /// - The generator output does not report a bag path (`Error::BagNotCreated`)
    /// - No generator is available (`Error::NotSupported`)
    async fn generate(&self, identifier: &str) -> crate::Result<PathBuf>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Trait for canonically formatting XML text
#[async_trait]
pub trait XmlFormatter: Send + Sync {
    /// Format `xml`, returning the reformatted text
    ///
    /// # Errors
    ///
    /// Returns an error if the formatter rejects the input, exits with a
    /// non-zero status, or exceeds its time budget.
    async fn format(&self, xml: String) -> crate::Result<String>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
