//! CLI-backed tools: the bag generator and the XML formatter

use super::parser::parse_bag_path;
use super::traits::{BagGenerator, XmlFormatter};
use crate::error::Error;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Bag generator that shells out to an external export command
///
/// The command is run as `<program> <args...> <identifier>`. Its standard
/// error is discarded; the bag path is read from standard output.
///
/// # Examples
///
/// ```no_run
/// use foxml_inliner::tools::{BagGenerator, CliBagGenerator};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let generator = CliBagGenerator::new(
///     PathBuf::from("/usr/local/bin/drush"),
///     vec!["@dsu".into(), "--user=1".into(), "create-islandora-bag".into(), "object".into()],
/// );
/// let bag = generator.generate("islandora:42").await?;
/// # Ok(())
/// # }
/// ```
pub struct CliBagGenerator {
    program: PathBuf,
    args: Vec<String>,
}

impl CliBagGenerator {
    /// Create a generator with an explicit program and leading arguments
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Attempt to find `drush` in PATH, using the default export arguments
    pub fn from_path() -> Option<Self> {
        which::which("drush")
            .ok()
            .map(|program| Self::new(program, crate::config::ToolsConfig::default().bag_generator_args))
    }
}

#[async_trait]
impl BagGenerator for CliBagGenerator {
    async fn generate(&self, identifier: &str) -> crate::Result<PathBuf> {
        debug!(program = %self.program.display(), identifier, "generating bag");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(identifier)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "Failed to execute {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            debug!(identifier, status = %output.status, "bag generator exited with failure");
        }

        parse_bag_path(&output.stdout).ok_or_else(|| Error::BagNotCreated {
            identifier: identifier.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "cli-bag"
    }
}

/// XML formatter that pipes documents through an external command
///
/// The document is written to the command's standard input and the
/// formatted text is read from its standard output. The child is killed if
/// it runs past the configured timeout.
pub struct CliXmlFormatter {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CliXmlFormatter {
    /// Create a formatter with an explicit program, arguments, and time budget
    pub fn new(program: PathBuf, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }

    /// Attempt to find `xmllint` in PATH, using `--format -` and a 10 second budget
    pub fn from_path() -> Option<Self> {
        let defaults = crate::config::ToolsConfig::default();
        which::which("xmllint")
            .ok()
            .map(|program| Self::new(program, defaults.formatter_args, defaults.formatter_timeout))
    }
}

#[async_trait]
impl XmlFormatter for CliXmlFormatter {
    async fn format(&self, xml: String) -> crate::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "Failed to execute {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        // Feed stdin concurrently so a formatter that writes before it has
        // read everything cannot deadlock against a full pipe.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(xml.as_bytes()).await {
                    debug!(error = %e, "formatter closed stdin early");
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                Error::ExternalTool(format!(
                    "Failed to wait for {}: {}",
                    self.program.display(),
                    e
                ))
            })?,
            Err(_) => {
                return Err(Error::Timeout {
                    tool: self.program.display().to_string(),
                    elapsed: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            Error::ExternalTool(format!(
                "{} produced non-UTF-8 output: {}",
                self.program.display(),
                e
            ))
        })
    }

    fn name(&self) -> &'static str {
        "cli-xml"
    }
}
