//=====================================================
// File: modules/name.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Logical module names and their filesystem/URL forms
// Objective: Convert dotted module names to relative paths under the
//            flat-file and package conventions, and back
//=====================================================

use std::fmt;
use std::path::PathBuf;

use crate::modules::ImportError;

/// Extension carried by every TideScript source file.
pub const SOURCE_EXT: &str = "tds";

/// File name that marks a directory as a package.
pub const PACKAGE_FILE: &str = "mod.tds";

/// A dotted logical module name (`pkg.sub.mod`). Segments are non-empty
/// and free of path separators; a name is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleName(Vec<String>);

impl ModuleName {
    pub fn from_dotted(name: &str) -> Result<Self, ImportError> {
        if name.is_empty() {
            return Err(ImportError::InvalidName {
                name: name.to_string(),
            });
        }
        let segments: Vec<String> = name.split('.').map(str::to_string).collect();
        for segment in &segments {
            if segment.is_empty() || segment.contains(['/', '\\']) {
                return Err(ImportError::InvalidName {
                    name: name.to_string(),
                });
            }
        }
        Ok(Self(segments))
    }

    pub fn as_str(&self) -> String {
        self.0.join(".")
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Relative filesystem path for this name. Flat-file convention maps
    /// `a.b.c` to `a/b/c.tds`; the package convention maps it to
    /// `a/b/c/mod.tds`.
    pub fn rel_path(&self, package: bool) -> PathBuf {
        let mut path: PathBuf = self.0.iter().collect();
        if package {
            path.push(PACKAGE_FILE);
        } else {
            path.set_extension(SOURCE_EXT);
        }
        path
    }

    /// Relative URL path for this name, always '/'-joined regardless of
    /// the host platform separator.
    pub fn url_path(&self, package: bool) -> String {
        if package {
            format!("{}/{}", self.0.join("/"), PACKAGE_FILE)
        } else {
            format!("{}.{}", self.0.join("/"), SOURCE_EXT)
        }
    }

    /// Inverse of [`ModuleName::url_path`]: recover the dotted name from a
    /// '/'-separated relative path. Package mode strips the trailing
    /// package file before converting separators back to dots.
    pub fn from_rel_path(rel_path: &str, package: bool) -> Result<Self, ImportError> {
        let trimmed = if package {
            rel_path
                .strip_suffix(PACKAGE_FILE)
                .map(|rest| rest.trim_end_matches('/'))
                .unwrap_or(rel_path)
        } else {
            rel_path
                .strip_suffix(&format!(".{}", SOURCE_EXT))
                .unwrap_or(rel_path)
        };
        if trimmed.is_empty() {
            return Err(ImportError::InvalidName {
                name: rel_path.to_string(),
            });
        }
        Self::from_dotted(&trimmed.replace('/', "."))
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn flat_file_path_for_nested_name() {
        let name = ModuleName::from_dotted("pkg.sub.mod").expect("name");
        assert_eq!(name.rel_path(false), Path::new("pkg/sub/mod.tds"));
        assert_eq!(name.url_path(false), "pkg/sub/mod.tds");
    }

    #[test]
    fn package_path_appends_init_file() {
        let name = ModuleName::from_dotted("pkg.sub").expect("name");
        assert_eq!(name.rel_path(true), Path::new("pkg/sub/mod.tds"));
        assert_eq!(name.url_path(true), "pkg/sub/mod.tds");
    }

    #[test]
    fn single_segment_paths() {
        let name = ModuleName::from_dotted("data_app").expect("name");
        assert_eq!(name.rel_path(false), Path::new("data_app.tds"));
        assert_eq!(name.rel_path(true), Path::new("data_app/mod.tds"));
    }

    #[test]
    fn from_rel_path_inverts_both_conventions() {
        let flat = ModuleName::from_rel_path("pkg/sub/mod.tds", false).expect("flat");
        assert_eq!(flat.as_str(), "pkg.sub.mod");

        let package = ModuleName::from_rel_path("pkg/sub/mod.tds", true).expect("package");
        assert_eq!(package.as_str(), "pkg.sub");
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(
            ModuleName::from_dotted(""),
            Err(ImportError::InvalidName { .. })
        ));
    }

    #[test]
    fn empty_segment_is_rejected() {
        assert!(ModuleName::from_dotted("pkg..mod").is_err());
        assert!(ModuleName::from_dotted(".pkg").is_err());
    }

    #[test]
    fn path_separators_in_segments_are_rejected() {
        assert!(ModuleName::from_dotted("pkg/mod").is_err());
    }
}
