//! External tools driven by the conversion pipeline
//!
//! Two seams are abstracted behind traits so the pipeline can be run and
//! tested without the real binaries:
//!
//! - [`BagGenerator`]: exports a record into a fresh bag archive
//!   ([`CliBagGenerator`] runs `drush`, [`NoOpBagGenerator`] always refuses)
//! - [`XmlFormatter`]: canonically formats output documents
//!   ([`CliXmlFormatter`] runs `xmllint --format -`, [`PassthroughFormatter`]
//!   leaves text unchanged)

mod cli;
mod noop;
mod parser;
mod traits;

pub use cli::{CliBagGenerator, CliXmlFormatter};
pub use noop::{NoOpBagGenerator, PassthroughFormatter};
pub use parser::parse_bag_path;
pub use traits::{BagGenerator, XmlFormatter};
