/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Project compilation.
//!
//! Compiling a project runs the [`SchemaBuilder`] over every template file,
//! merges the templates each file discovers, processes linked stylesheets
//! and resolves field priorities. Files are merged in sorted path order, so
//! the resulting [`Theme`] does not depend on how the files were found.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::builder::{Component, ParsedTemplate, SchemaBuilder};
use crate::error::{CompileError, CompileResult};
use crate::helper::HelperRegistry;
use crate::options::CompileOptions;
use crate::resolver::{ComponentResolver, MemoryResolver, component_key};
use crate::schema::{Template, TemplateKind, template_id};
use crate::stylesheet::{PassthroughProcessor, Stylesheet, StylesheetProcessor};
use vellum_syntax::Program;

/// One project file, addressed by its `/`-separated path relative to the
/// project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// A renderable page or collection template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub name: String,
    pub kind: TemplateKind,
    /// Source path the page was compiled from.
    pub path: String,
    #[serde(skip)]
    pub ast: Program,
}

/// The compiled project.
#[derive(Debug, Clone, Default)]
pub struct Theme {
    /// Every template in the project, keyed by id.
    pub templates: BTreeMap<String, Template>,
    /// Page and collection templates, keyed by template id.
    pub pages: BTreeMap<String, Page>,
    /// Components, keyed by component key.
    pub components: BTreeMap<String, Component>,
    /// Processed stylesheets, keyed by the path templates link to.
    pub stylesheets: BTreeMap<String, Stylesheet>,
}

impl Theme {
    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// The page compiled for template `name` of `kind`.
    pub fn page(&self, name: &str, kind: TemplateKind) -> Option<&Page> {
        self.pages.get(&template_id(name, kind))
    }

    /// The schema as pretty-printed JSON.
    pub fn schema_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.templates)
    }

    fn merge(&mut self, parsed: ParsedTemplate) {
        for (id, template) in parsed.templates {
            match self.templates.get_mut(&id) {
                Some(existing) => existing.merge(&template),
                None => {
                    self.templates.insert(id, template);
                }
            }
        }
        for (key, component) in parsed.components {
            self.components.entry(key).or_insert(component);
        }
    }
}

impl ComponentResolver for Theme {
    fn resolve(&self, tag: &str) -> Option<String> {
        self.components
            .get(&component_key(tag))
            .map(|component| component.source.clone())
    }
}

/// Compiles a project into a [`Theme`].
pub struct Compiler {
    options: CompileOptions,
    helpers: HelperRegistry,
    processor: Box<dyn StylesheetProcessor>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            helpers: HelperRegistry::with_builtins(),
            processor: Box::new(PassthroughProcessor),
        }
    }

    /// Use `helpers` to decide which names are helpers and what they produce.
    pub fn with_helpers(mut self, helpers: HelperRegistry) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn with_processor(mut self, processor: impl StylesheetProcessor + 'static) -> Self {
        self.processor = Box::new(processor);
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Discover and compile every file under `root`.
    pub fn compile_dir(&self, root: &Path) -> CompileResult<Theme> {
        let files = discover(root, &self.options)?;
        self.compile_sources(files)
    }

    /// Compile in-memory project files.
    pub fn compile_sources(&self, mut files: Vec<SourceFile>) -> CompileResult<Theme> {
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut css: HashMap<&str, &str> = HashMap::new();
        let mut sources = Vec::new();
        for file in &files {
            if self.options.is_template(&file.path) {
                let (name, kind) = classify(&file.path, &self.options);
                sources.push((file, name, kind));
            } else if file.path.ends_with(".css") {
                css.insert(file.path.trim_start_matches('/'), file.contents.as_str());
            }
        }

        let mut resolver = MemoryResolver::new();
        for (file, name, kind) in &sources {
            if *kind == TemplateKind::Component {
                resolver.add(name, file.contents.as_str());
            }
        }

        let mut theme = Theme::default();
        let mut missing = HashSet::new();
        for (file, name, kind) in sources {
            let parsed = SchemaBuilder::new(&resolver, &self.helpers)
                .build(&name, kind, &file.contents)
                .map_err(|source| CompileError::File {
                    path: file.path.clone(),
                    source: Box::new(source),
                })?;
            debug!(path = %file.path, %name, %kind, "Compiled template");

            for href in &parsed.stylesheets {
                if theme.stylesheets.contains_key(href) || missing.contains(href) {
                    continue;
                }
                let Some(contents) = css.get(href.trim_start_matches('/')) else {
                    warn!(path = %file.path, %href, "Linked stylesheet not found");
                    missing.insert(href.clone());
                    continue;
                };
                let processed = self.processor.process(href, contents).map_err(|source| {
                    CompileError::File {
                        path: file.path.clone(),
                        source: Box::new(source),
                    }
                })?;
                let stylesheet = Stylesheet::new(href.as_str(), processed);
                debug!(%href, output = %stylesheet.output, "Processed stylesheet");
                theme.stylesheets.insert(href.clone(), stylesheet);
            }

            match kind {
                TemplateKind::Page | TemplateKind::Collection => {
                    theme.pages.insert(
                        template_id(&name, kind),
                        Page {
                            name: name.clone(),
                            kind,
                            path: file.path.clone(),
                            ast: parsed.ast.clone(),
                        },
                    );
                }
                TemplateKind::Component => {
                    theme.components.insert(
                        name.clone(),
                        Component {
                            name: name.clone(),
                            source: file.contents.clone(),
                            ast: parsed.ast.clone(),
                        },
                    );
                }
                TemplateKind::Settings => {}
            }
            theme.merge(parsed);
        }

        for template in theme.templates.values_mut() {
            template.normalize();
        }

        debug!(
            templates = theme.templates.len(),
            pages = theme.pages.len(),
            components = theme.components.len(),
            stylesheets = theme.stylesheets.len(),
            "Compiled theme"
        );
        Ok(theme)
    }
}

/// Compile the project at `root`, reading `vellum.yml` when present.
pub fn compile(root: impl AsRef<Path>) -> CompileResult<Theme> {
    let root = root.as_ref();
    let options = CompileOptions::load(root)?;
    Compiler::new(options).compile_dir(root)
}

/// Template name and kind for a project-relative path.
///
/// `collections/posts.html` is the `posts` collection, `components/Card.html`
/// and `partials/_card.html` are the `card` component, anything else is a
/// page named after its path without extension.
pub fn classify(path: &str, options: &CompileOptions) -> (String, TemplateKind) {
    let path = path.trim_start_matches('/');
    let without_ext = match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    };
    let mut segments: Vec<&str> = without_ext.split('/').collect();
    let stem = segments.last().copied().unwrap_or_default();

    if segments.len() > 1 && segments[0] == options.components_dir {
        return (component_key(stem), TemplateKind::Component);
    }
    if !options.component_prefix.is_empty() && stem.starts_with(&options.component_prefix) {
        return (component_key(stem), TemplateKind::Component);
    }
    if segments.len() > 1 && segments[0] == options.collections_dir {
        segments.remove(0);
        return (segments.join("/"), TemplateKind::Collection);
    }
    (without_ext.to_string(), TemplateKind::Page)
}

/// Collect templates and stylesheets under `root`, skipping hidden
/// directories and the configured ignore names.
pub fn discover(root: &Path, options: &CompileOptions) -> CompileResult<Vec<SourceFile>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry, options));

    for entry in walker.filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !options.is_template(&relative) && !relative.ends_with(".css") {
            continue;
        }
        debug!(path = %relative, "Discovered project file");
        let contents = std::fs::read_to_string(entry.path())?;
        files.push(SourceFile::new(relative, contents));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn is_ignored(entry: &walkdir::DirEntry, options: &CompileOptions) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || options.ignore.iter().any(|ignored| ignored.as_str() == name.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classify() {
        let options = CompileOptions::default();
        assert_eq!(
            classify("index.html", &options),
            ("index".to_string(), TemplateKind::Page)
        );
        assert_eq!(
            classify("blog/about.hbs", &options),
            ("blog/about".to_string(), TemplateKind::Page)
        );
        assert_eq!(
            classify("collections/posts.html", &options),
            ("posts".to_string(), TemplateKind::Collection)
        );
        assert_eq!(
            classify("components/Card.html", &options),
            ("card".to_string(), TemplateKind::Component)
        );
        assert_eq!(
            classify("partials/_site-header.html", &options),
            ("site-header".to_string(), TemplateKind::Component)
        );
    }

    #[test]
    fn test_discover_skips_hidden_and_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "{{this.title}}").unwrap();
        fs::write(temp.path().join("notes.txt"), "not a template").unwrap();
        fs::create_dir(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("css/site.css"), "body{}").unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/hook.html"), "x").unwrap();
        fs::create_dir(temp.path().join("node_modules")).unwrap();
        fs::write(temp.path().join("node_modules/pkg.html"), "x").unwrap();

        let files = discover(temp.path(), &CompileOptions::default()).unwrap();
        let paths: Vec<&str> = files.iter().map(|file| file.path.as_str()).collect();
        assert_eq!(paths, vec!["css/site.css", "index.html"]);
    }

    #[test]
    fn test_file_errors_name_the_file() {
        let err = Compiler::default()
            .compile_sources(vec![SourceFile::new("broken.html", "{{title}}")])
            .unwrap_err();
        match err {
            CompileError::File { path, source } => {
                assert_eq!(path, "broken.html");
                assert!(matches!(*source, CompileError::MissingContext { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_theme_resolves_components() {
        let theme = Compiler::default()
            .compile_sources(vec![
                SourceFile::new("components/Card.html", "<div>{{this.heading}}</div>"),
                SourceFile::new("index.html", "<Card />"),
            ])
            .unwrap();
        assert!(theme.resolve("Card").is_some());
        assert!(theme.template("card-component").is_some());
        assert!(theme.page("index", TemplateKind::Page).is_some());
    }
}
