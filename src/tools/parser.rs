//! Parser for bag generator output

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static BAG_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bag created and saved at ([^\n]+?\.zip)").expect("valid bag path regex")
});

/// Extract the bag path from the generator's standard output
///
/// Looks for the first `Bag created and saved at <path>.zip` line and
/// returns the trimmed path, or `None` if no such line exists.
pub fn parse_bag_path(stdout: &[u8]) -> Option<PathBuf> {
    let output = String::from_utf8_lossy(stdout);
    BAG_PATH
        .captures(&output)
        .and_then(|captures| captures.get(1))
        .map(|path| path.as_str().trim())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}
