//! Partial template lookup
//!
//! Partials live in `partials/` next to the templates, or in `../partials`
//! for fragments shared between several template directories. The first
//! directory wins, and within a directory `.yaml.erb` wins over `.yml.erb`.

use std::path::{Path, PathBuf};

use crate::error::RenderErrorKind;

const PARTIAL_DIRS: [&str; 2] = ["partials", "../partials"];
const PARTIAL_EXTENSIONS: [&str; 2] = [".yaml.erb", ".yml.erb"];

#[derive(Debug, Clone)]
pub struct PartialResolver {
    search_dirs: Vec<PathBuf>,
}

impl PartialResolver {
    pub fn new(template_dir: &Path) -> Self {
        Self {
            search_dirs: PARTIAL_DIRS
                .iter()
                .map(|d| normalize(&template_dir.join(d)))
                .collect(),
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn resolve(&self, name: &str) -> Result<PathBuf, RenderErrorKind> {
        for dir in &self.search_dirs {
            for ext in PARTIAL_EXTENSIONS {
                let candidate = dir.join(format!("{}{}", name, ext));
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        Err(RenderErrorKind::PartialNotFound {
            name: name.to_string(),
            searched: self
                .search_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect(),
        })
    }
}

/// Collapse `..` lexically so error messages show real directories
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn layout() -> (tempfile::TempDir, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let templates = root.path().join("app");
        fs::create_dir_all(templates.join("partials")).unwrap();
        fs::create_dir_all(root.path().join("partials")).unwrap();
        (root, templates)
    }

    #[test]
    fn primary_dir_wins_over_parent() {
        let (root, templates) = layout();
        fs::write(templates.join("partials/health.yaml.erb"), "a: 1").unwrap();
        fs::write(root.path().join("partials/health.yaml.erb"), "a: 2").unwrap();

        let resolver = PartialResolver::new(&templates);
        let found = resolver.resolve("health").unwrap();
        assert_eq!(found, templates.join("partials/health.yaml.erb"));
        // idempotent
        assert_eq!(resolver.resolve("health").unwrap(), found);
    }

    #[test]
    fn yaml_erb_before_yml_erb() {
        let (_root, templates) = layout();
        fs::write(templates.join("partials/health.yml.erb"), "a: 1").unwrap();
        fs::write(templates.join("partials/health.yaml.erb"), "a: 2").unwrap();
        let found = PartialResolver::new(&templates).resolve("health").unwrap();
        assert!(found.to_string_lossy().ends_with("health.yaml.erb"));
    }

    #[test]
    fn primary_yml_erb_beats_parent_yaml_erb() {
        let (root, templates) = layout();
        fs::write(templates.join("partials/health.yml.erb"), "a: 1").unwrap();
        fs::write(root.path().join("partials/health.yaml.erb"), "a: 2").unwrap();
        let found = PartialResolver::new(&templates).resolve("health").unwrap();
        assert_eq!(found, templates.join("partials/health.yml.erb"));
    }

    #[test]
    fn falls_back_to_parent_dir() {
        let (root, templates) = layout();
        fs::write(root.path().join("partials/shared.yml.erb"), "a: 1").unwrap();
        let found = PartialResolver::new(&templates).resolve("shared").unwrap();
        assert_eq!(found, root.path().join("partials/shared.yml.erb"));
    }

    #[test]
    fn missing_partial_names_searched_dirs() {
        let (root, templates) = layout();
        let err = PartialResolver::new(&templates).resolve("nope").unwrap_err();
        match err {
            RenderErrorKind::PartialNotFound { name, searched } => {
                assert_eq!(name, "nope");
                assert_eq!(
                    searched,
                    vec![
                        templates.join("partials").display().to_string(),
                        root.path().join("partials").display().to_string(),
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
