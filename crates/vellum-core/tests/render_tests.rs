/*
 * render_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for the render interpreter.
 */

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::json;
use vellum_core::{
    BlockRenderer, Compiler, ContextBuilder, Helper, HelperRegistry, MemoryResolver,
    NullResolver, Record, RenderError, RenderMode, RenderOptions, RenderResult, Renderer,
    SourceFile, Stylesheet, TemplateKind, Value, ValueMap, render,
};
use vellum_dom::{Document, Namespace, diff};
use vellum_syntax::parse;

fn context(this: serde_json::Value) -> ValueMap {
    let mut context = ValueMap::new();
    context.insert("this".to_string(), Value::from(this));
    context
}

fn render_with(
    source: &str,
    context: ValueMap,
    resolver: &MemoryResolver,
    helpers: &HelperRegistry,
) -> RenderResult<Document> {
    let program = parse(source)?;
    let mut document = Document::new();
    render(&mut document, &program, context, ValueMap::new(), resolver, helpers)?;
    Ok(document)
}

fn render_html(source: &str, this: serde_json::Value) -> String {
    render_with(
        source,
        context(this),
        &MemoryResolver::new(),
        &HelperRegistry::with_builtins(),
    )
    .unwrap()
    .to_string()
}

const INDEX: &str =
    "<main><h1>{{this.title}}</h1>{{#each @collection as |post|}}<p>{{post.body}}</p>{{/each}}</main>";

#[tokio::test]
async fn test_compiled_page_renders_collection_records() {
    let theme = Compiler::default()
        .compile_sources(vec![SourceFile::new("index.html", INDEX)])
        .unwrap();
    let helpers = HelperRegistry::with_builtins();

    let home = Record::new("home", "index-page")
        .with_permalink("/")
        .with_content("title", json!("Welcome"));
    let records = vec![
        home.clone(),
        Record::new("p1", "index-collection").with_content("body", json!("hi")),
    ];
    let page = ContextBuilder::new(&theme, &helpers)
        .build(&home, &records)
        .await;

    let ast = &theme.page("index", TemplateKind::Page).unwrap().ast;
    let mut document = Document::new();
    Renderer::new(&mut document, &theme, &helpers)
        .with_stylesheets(&theme.stylesheets)
        .render(ast, page.context, page.data)
        .unwrap();

    insta::assert_snapshot!(document.to_string(), @"<main><h1>Welcome</h1><p>hi</p></main>");
}

#[test]
fn test_unknown_block_helper_fails_the_render() {
    let result = render_with(
        "<div>{{#repeat this.items}}x{{/repeat}}</div>",
        context(json!({ "items": [1, 2] })),
        &MemoryResolver::new(),
        &HelperRegistry::with_builtins(),
    );
    assert!(matches!(result, Err(RenderError::UnknownHelper { name }) if name == "repeat"));
}

#[test]
fn test_missing_values_render_empty() {
    assert_eq!(
        render_html("<p>{{this.missing}}{{this.nested.deeper}}</p>", json!({})),
        "<p></p>"
    );
}

#[test]
fn test_booleans_interpolate() {
    assert_eq!(
        render_html("<p>{{this.yes}}|{{this.no}}</p>", json!({ "yes": true, "no": false })),
        "<p>true|</p>"
    );
}

#[test]
fn test_unknown_helper_call_degrades_to_nothing() {
    assert_eq!(
        render_html("<p>{{shout this.name}}</p>", json!({ "name": "x" })),
        "<p></p>"
    );
}

#[test]
fn test_each_with_data_variables() {
    assert_eq!(
        render_html(
            "<ul>{{#each this.items as |item|}}<li>{{@index}}:{{item}}</li>{{else}}<li>none</li>{{/each}}</ul>",
            json!({ "items": ["a", "b"] }),
        ),
        "<ul><li>0:a</li><li>1:b</li></ul>"
    );
    assert_eq!(
        render_html(
            "<ul>{{#each this.items as |item|}}<li>{{item}}</li>{{else}}<li>none</li>{{/each}}</ul>",
            json!({ "items": [] }),
        ),
        "<ul><li>none</li></ul>"
    );
}

#[test]
fn test_if_else_chain() {
    let source = "<p>{{#if this.a}}a{{else if this.b}}b{{else}}c{{/if}}</p>";
    assert_eq!(render_html(source, json!({ "a": true })), "<p>a</p>");
    assert_eq!(render_html(source, json!({ "b": "yes" })), "<p>b</p>");
    assert_eq!(render_html(source, json!({})), "<p>c</p>");
}

#[test]
fn test_collection_helper_window() {
    let mut data = ValueMap::new();
    data.insert(
        "collection".to_string(),
        Value::from(json!({ "posts": [{ "title": "one" }, { "title": "two" }, { "title": "three" }] })),
    );
    let program = parse(
        "<ol>{{#collection @collection.posts offset=1 limit=1 as |post|}}<li>{{post.title}}</li>{{/collection}}</ol>",
    )
    .unwrap();
    let helpers = HelperRegistry::with_builtins();
    let mut document = Document::new();
    render(&mut document, &program, ValueMap::new(), data, &NullResolver, &helpers).unwrap();
    assert_eq!(document.to_string(), "<ol><li>two</li></ol>");
}

#[test]
fn test_component_with_arguments_and_yield() {
    let mut resolver = MemoryResolver::new();
    resolver.add(
        "Card",
        "<article class=\"card {{@tone}}\"><h2>{{this.heading}}</h2>{{yield}}</article>",
    );
    let mut context = context(json!({ "intro": "inside" }));
    context.insert("card".to_string(), Value::from(json!({ "heading": "Hello" })));

    let document = render_with(
        "<main><Card @tone=\"dark\"><p>{{this.intro}}</p></Card></main>",
        context,
        &resolver,
        &HelperRegistry::with_builtins(),
    )
    .unwrap();

    assert_eq!(
        document.to_string(),
        "<main><article class=\"card dark\"><h2>Hello</h2><p>inside</p></article></main>"
    );
}

#[test]
fn test_unresolved_component_fails() {
    let result = render_with(
        "<main><Missing /></main>",
        ValueMap::new(),
        &MemoryResolver::new(),
        &HelperRegistry::with_builtins(),
    );
    assert!(matches!(result, Err(RenderError::UnresolvedComponent { tag }) if tag == "Missing"));
}

#[test]
fn test_debug_markers_number_each_interpolation() {
    let program = parse("<p>{{this.a}} and {{this.b}}</p>").unwrap();
    let helpers = HelperRegistry::with_builtins();
    let mut document = Document::new();
    Renderer::new(&mut document, &NullResolver, &helpers)
        .with_options(RenderOptions {
            mode: RenderMode::Production,
            debug_markers: true,
        })
        .render(&program, context(json!({ "a": "x", "b": "y" })), ValueMap::new())
        .unwrap();

    assert_eq!(
        document.to_string(),
        "<p><span data-vellum-field=\"0\">x</span> and <span data-vellum-field=\"1\">y</span></p>"
    );
}

#[test]
fn test_svg_subtree_uses_svg_namespace() {
    let document = render_with(
        "<div><svg viewBox=\"0 0 10 10\"><circle r=\"{{this.r}}\"></circle></svg><p>text</p></div>",
        context(json!({ "r": 4 })),
        &MemoryResolver::new(),
        &HelperRegistry::with_builtins(),
    )
    .unwrap();

    let root = document.root();
    let svg = document.find_element(root, "svg").unwrap();
    let circle = document.find_element(root, "circle").unwrap();
    let p = document.find_element(root, "p").unwrap();
    assert_eq!(document.element(svg).unwrap().namespace, Namespace::Svg);
    assert_eq!(document.element(circle).unwrap().namespace, Namespace::Svg);
    assert_eq!(document.element(p).unwrap().namespace, Namespace::Html);
    assert_eq!(document.attribute(circle, "r"), Some("4"));
}

#[test]
fn test_script_text_accumulates_into_one_node() {
    let document = render_with(
        "<div><script>var a = {{this.a}}; var b = {{this.b}};</script></div>",
        context(json!({ "a": 1, "b": 2 })),
        &MemoryResolver::new(),
        &HelperRegistry::with_builtins(),
    )
    .unwrap();

    let script = document.find_element(document.root(), "script").unwrap();
    assert_eq!(document.children(script).len(), 1);
    assert_eq!(document.text_content(script), "var a = 1; var b = 2;");
}

#[test]
fn test_markup_values_become_nodes() {
    assert_eq!(
        render_html(
            "<div>{{html this.body}}</div>",
            json!({ "body": "<b>bold</b> text" })
        ),
        "<div><b>bold</b> text</div>"
    );
    assert_eq!(
        render_html("<div>{{{this.body}}}</div>", json!({ "body": "<i>it</i>" })),
        "<div><i>it</i></div>"
    );
    assert_eq!(
        render_html("<div>{{this.body}}</div>", json!({ "body": "<b>" })),
        "<div>&lt;b&gt;</div>"
    );
}

#[test]
fn test_markup_drops_event_handlers() {
    assert_eq!(
        render_html(
            "<div>{{{this.body}}}</div>",
            json!({ "body": "<a href=\"javascript:alert(1)\" onclick=\"x()\" title=\"t\">go</a>" })
        ),
        "<div><a title=\"t\">go</a></div>"
    );
}

#[test]
fn test_malformed_markup_values_still_render() {
    let source = "<main><div>{{{this.body}}}</div><p>{{this.after}}</p></main>";
    assert_eq!(
        render_html(source, json!({ "body": "<b>bold <i>x</b></i>", "after": "rest" })),
        "<main><div><b>bold <i>x</i></b></div><p>rest</p></main>"
    );
    assert_eq!(
        render_html(source, json!({ "body": "<p>a</p></div>", "after": "rest" })),
        "<main><div><p>a</p></div><p>rest</p></main>"
    );
    assert_eq!(
        render_html(
            "<main>{{html this.body}}</main>",
            json!({ "body": "</span>loose <em>open" })
        ),
        "<main>loose <em>open</em></main>"
    );
}

fn stylesheets() -> BTreeMap<String, Stylesheet> {
    let sheet = Stylesheet::new("/site.css", "body{margin:0}".to_string());
    BTreeMap::from([("/site.css".to_string(), sheet)])
}

fn render_stylesheet(mode: RenderMode) -> String {
    let program =
        parse("<html><head><link rel=\"stylesheet\" href=\"/site.css\"></head></html>").unwrap();
    let helpers = HelperRegistry::with_builtins();
    let sheets = stylesheets();
    let mut document = Document::new();
    Renderer::new(&mut document, &NullResolver, &helpers)
        .with_options(RenderOptions {
            mode,
            debug_markers: false,
        })
        .with_stylesheets(&sheets)
        .render(&program, ValueMap::new(), ValueMap::new())
        .unwrap();
    document.to_string()
}

#[test]
fn test_stylesheets_inline_in_development() {
    assert_eq!(
        render_stylesheet(RenderMode::Development),
        "<html><head><style>body{margin:0}</style></head></html>"
    );
}

#[test]
fn test_stylesheets_link_hashed_file_in_production() {
    let output = stylesheets()["/site.css"].output.clone();
    assert_eq!(
        render_stylesheet(RenderMode::Production),
        format!("<html><head><link rel=\"stylesheet\" href=\"{output}\"></head></html>")
    );
}

#[derive(Debug, Default)]
struct BadgeHelper;

impl Helper for BadgeHelper {
    fn render(
        &self,
        _params: &[Value],
        _hash: &ValueMap,
        _blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        Ok(Value::from("badge"))
    }

    fn inject(&self) -> Option<String> {
        Some("<script src=\"/badge.js\"></script>".to_string())
    }
}

#[derive(Debug, Default)]
struct FailingHelper;

impl Helper for FailingHelper {
    fn render(
        &self,
        _params: &[Value],
        _hash: &ValueMap,
        _blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        Err(RenderError::helper("fail", "no data source"))
    }
}

#[test]
fn test_helper_errors_fail_the_render() {
    let mut helpers = HelperRegistry::with_builtins();
    helpers.register_default::<FailingHelper>("fail");
    let result = render_with(
        "<div>{{#fail}}never{{/fail}}</div>",
        ValueMap::new(),
        &MemoryResolver::new(),
        &helpers,
    );
    assert!(matches!(
        result,
        Err(RenderError::Helper { name, message }) if name == "fail" && message == "no data source"
    ));
}

#[test]
fn test_helper_injections_land_in_head_once() {
    let mut helpers = HelperRegistry::with_builtins();
    helpers.register_default::<BadgeHelper>("badge");
    let html = render_with(
        "<html><head><title>t</title></head><body>{{badge}} {{badge}}</body></html>",
        ValueMap::new(),
        &MemoryResolver::new(),
        &helpers,
    )
    .unwrap()
    .to_string();

    assert_eq!(
        html,
        "<html><head><title>t</title><script src=\"/badge.js\"></script></head><body>badge badge</body></html>"
    );
}

#[test]
fn test_first_element_becomes_the_only_root() {
    let program = parse("leading text<p>one</p><p>two</p>").unwrap();
    let helpers = HelperRegistry::with_builtins();
    let mut document = Document::new();
    let stale = document.create_element("section", Namespace::Html);
    document.append_child(document.root(), stale);

    render(
        &mut document,
        &program,
        ValueMap::new(),
        ValueMap::new(),
        &NullResolver,
        &helpers,
    )
    .unwrap();

    assert_eq!(document.children(document.root()).len(), 1);
    assert_eq!(document.to_string(), "<p>one</p>");
}

#[test]
fn test_rerender_patches_live_document() {
    let source = "<ul>{{#each this.items as |item|}}<li key=\"{{item}}\">{{item}}</li>{{/each}}</ul>";
    let mut live = render_with(
        source,
        context(json!({ "items": ["a", "b", "c"] })),
        &MemoryResolver::new(),
        &HelperRegistry::with_builtins(),
    )
    .unwrap();
    let fresh = render_with(
        source,
        context(json!({ "items": ["c", "a", "b", "d"] })),
        &MemoryResolver::new(),
        &HelperRegistry::with_builtins(),
    )
    .unwrap();

    diff(&fresh, &mut live);
    assert_eq!(live.to_string(), fresh.to_string());
    assert_eq!(
        live.to_string(),
        "<ul><li key=\"c\">c</li><li key=\"a\">a</li><li key=\"b\">b</li><li key=\"d\">d</li></ul>"
    );
}
