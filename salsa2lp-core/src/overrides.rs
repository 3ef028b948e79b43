//! Static package overrides (`Packages.txt`).
//!
//! One `<package> <group>` pair per line. Blank lines and `#` comments are
//! ignored. Packages named here are synchronised from `<group>` instead of
//! the default group, and are added to the batch even when discovery does
//! not list them.

use std::path::Path;

use crate::error::{io_err, ConfigError};
use crate::types::{PackageName, PackageRef, SourceGroup};

/// Parsed overrides plus the group used for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overrides {
    default_group: SourceGroup,
    entries: Vec<PackageRef>,
}

impl Overrides {
    /// No overrides; every package maps to `default_group`.
    pub fn empty(default_group: impl Into<SourceGroup>) -> Self {
        Self {
            default_group: default_group.into(),
            entries: Vec::new(),
        }
    }

    /// Parse override text. `path` is only used for error reporting.
    pub fn parse(
        contents: &str,
        default_group: impl Into<SourceGroup>,
        path: &Path,
    ) -> Result<Self, ConfigError> {
        let mut overrides = Self::empty(default_group);
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(name), Some(group), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(ConfigError::Overrides {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    content: raw.to_string(),
                });
            };
            overrides.insert(PackageRef::new(name, group));
        }
        Ok(overrides)
    }

    /// Read `path`; a missing file yields an empty set.
    pub fn load(path: &Path, default_group: impl Into<SourceGroup>) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("no overrides file at {}", path.display());
            return Ok(Self::empty(default_group));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Self::parse(&contents, default_group, path)
    }

    // Later lines win over earlier ones for the same package.
    fn insert(&mut self, entry: PackageRef) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn default_group(&self) -> &SourceGroup {
        &self.default_group
    }

    pub fn entries(&self) -> &[PackageRef] {
        &self.entries
    }

    /// Source group for `name`: the override if present, else the default.
    pub fn group_for(&self, name: &PackageName) -> SourceGroup {
        self.entries
            .iter()
            .find(|e| &e.name == name)
            .map(|e| e.source_group.clone())
            .unwrap_or_else(|| self.default_group.clone())
    }

    /// Resolve a single package name into a [`PackageRef`].
    pub fn resolve(&self, name: impl Into<PackageName>) -> PackageRef {
        let name = name.into();
        let group = self.group_for(&name);
        PackageRef {
            name,
            source_group: group,
        }
    }

    /// Merge discovered packages with the override entries.
    ///
    /// An override replaces a discovered package of the same name in place;
    /// overrides naming undiscovered packages are appended in file order.
    pub fn augment(&self, discovered: Vec<PackageRef>) -> Vec<PackageRef> {
        let mut out: Vec<PackageRef> = Vec::with_capacity(discovered.len() + self.entries.len());
        for pkg in discovered {
            if out.iter().any(|p| p.name == pkg.name) {
                continue;
            }
            match self.entries.iter().find(|e| e.name == pkg.name) {
                Some(over) => out.push(over.clone()),
                None => out.push(pkg),
            }
        }
        for over in &self.entries {
            if !out.iter().any(|p| p.name == over.name) {
                out.push(over.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<Overrides, ConfigError> {
        Overrides::parse(text, "ubports-team", &PathBuf::from("Packages.txt"))
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let o = parse("# header\n\nlomiri-clock-app  ubports-team\n  ayatana-indicator-power debian-ayatana-team \n")
            .expect("parse");
        assert_eq!(o.entries().len(), 2);
        assert_eq!(
            o.group_for(&PackageName::from("ayatana-indicator-power")),
            SourceGroup::from("debian-ayatana-team")
        );
    }

    #[test]
    fn unknown_package_gets_default_group() {
        let o = parse("").expect("parse");
        assert_eq!(
            o.resolve("lomiri").source_group,
            SourceGroup::from("ubports-team")
        );
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = parse("ok group\njust-a-name\n").unwrap_err();
        match err {
            ConfigError::Overrides { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "just-a-name");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse("a b c\n").is_err(), "three fields are rejected");
    }

    #[test]
    fn augment_replaces_and_appends() {
        let o = parse("lomiri other-group\nextra third-group\n").expect("parse");
        let discovered = vec![
            PackageRef::new("lomiri", "ubports-team"),
            PackageRef::new("lomiri-ui-toolkit", "ubports-team"),
            PackageRef::new("lomiri", "ubports-team"),
        ];
        let merged = o.augment(discovered);
        assert_eq!(
            merged,
            vec![
                PackageRef::new("lomiri", "other-group"),
                PackageRef::new("lomiri-ui-toolkit", "ubports-team"),
                PackageRef::new("extra", "third-group"),
            ]
        );
    }

    #[test]
    fn later_duplicate_line_wins() {
        let o = parse("pkg a\npkg b\n").expect("parse");
        assert_eq!(o.entries(), &[PackageRef::new("pkg", "b")]);
    }
}
