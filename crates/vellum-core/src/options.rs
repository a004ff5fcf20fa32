/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile and render configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompileError, CompileResult};

/// Project options file, read from the project root when present.
pub const OPTIONS_FILE: &str = "vellum.yml";

/// How a project directory is turned into templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompileOptions {
    /// File extensions treated as templates.
    pub template_extensions: Vec<String>,
    /// Directory names skipped during discovery, in addition to hidden ones.
    pub ignore: Vec<String>,
    /// Top-level directory holding collection templates.
    pub collections_dir: String,
    /// Top-level directory holding components.
    pub components_dir: String,
    /// File stem prefix that marks a component outside `components_dir`.
    pub component_prefix: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            template_extensions: vec!["html".to_string(), "hbs".to_string()],
            ignore: vec![
                "node_modules".to_string(),
                "dist".to_string(),
                "target".to_string(),
            ],
            collections_dir: "collections".to_string(),
            components_dir: "components".to_string(),
            component_prefix: "_".to_string(),
        }
    }
}

impl CompileOptions {
    /// Read `vellum.yml` from `root`, or use defaults when it is absent.
    pub fn load(root: &Path) -> CompileResult<Self> {
        let path = root.join(OPTIONS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Self::from_yaml(&text).map_err(|message| CompileError::Options {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let options: Self = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        debug!(?options, "Loaded compile options");
        Ok(options)
    }

    pub fn is_template(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.template_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Live preview: stylesheets are inlined.
    Development,
    /// Published output: stylesheets point at hashed files.
    #[default]
    Production,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderOptions {
    pub mode: RenderMode,
    /// Wrap each interpolation in `<span data-vellum-field="N">`.
    pub debug_markers: bool,
}

impl RenderOptions {
    /// Options for a live preview.
    pub fn development() -> Self {
        Self {
            mode: RenderMode::Development,
            debug_markers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert!(options.is_template("index.html"));
        assert!(options.is_template("layouts/base.HBS"));
        assert!(!options.is_template("site.css"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let options = CompileOptions::from_yaml("ignore: [drafts]\n").unwrap();
        assert_eq!(options.ignore, vec!["drafts"]);
        assert_eq!(options.collections_dir, "collections");
    }

    #[test]
    fn test_load_from_project() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(OPTIONS_FILE),
            "template-extensions: [html]\ncomponents-dir: partials\n",
        )
        .unwrap();
        let options = CompileOptions::load(temp.path()).unwrap();
        assert_eq!(options.template_extensions, vec!["html"]);
        assert_eq!(options.components_dir, "partials");
    }

    #[test]
    fn test_invalid_yaml_is_an_options_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(OPTIONS_FILE), "ignore: {").unwrap();
        let err = CompileOptions::load(temp.path()).unwrap_err();
        assert!(matches!(err, CompileError::Options { .. }));
    }

    #[test]
    fn test_render_options_deserialize() {
        let options: RenderOptions =
            serde_yaml::from_str("mode: development\ndebug-markers: true\n").unwrap();
        assert_eq!(options, RenderOptions::development());
    }
}
