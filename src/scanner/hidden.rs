//! Hidden-file policy.
//!
//! Three conventions are folded into one explicit setting:
//! - Unix dotfiles (`.cache`, `.bashrc`)
//! - `$`-prefixed system entries (`$Recycle.Bin`, `$MFT`), which only count
//!   as hidden when the platform marks them: the hidden attribute on
//!   Windows, a regular file elsewhere.

use std::fs::Metadata;

use serde::{Deserialize, Serialize};

/// Which directory entries the walker treats as hidden.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HiddenPolicy {
    /// Nothing is hidden.
    Include,
    /// Names with a leading dot are hidden.
    DotFiles,
    /// Dotfiles, plus `$`-prefixed entries the platform marks as system files.
    #[default]
    DotFilesAndSystem,
}

impl HiddenPolicy {
    /// Decide whether an entry is hidden.
    ///
    /// `metadata` is only consulted for `$`-prefixed names; `None` means
    /// the entry could not be inspected and is treated as visible.
    #[must_use]
    pub fn is_hidden(self, name: &str, metadata: Option<&Metadata>) -> bool {
        match self {
            Self::Include => false,
            Self::DotFiles => name.starts_with('.'),
            Self::DotFilesAndSystem => {
                if name.starts_with('.') {
                    return true;
                }
                name.starts_with('$') && metadata.is_some_and(has_system_marker)
            }
        }
    }

    /// Whether this policy needs metadata to classify `name`.
    #[must_use]
    pub fn needs_metadata(self, name: &str) -> bool {
        self == Self::DotFilesAndSystem && name.starts_with('$')
    }
}

#[cfg(windows)]
fn has_system_marker(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
}

#[cfg(not(windows))]
fn has_system_marker(metadata: &Metadata) -> bool {
    metadata.is_file()
}
