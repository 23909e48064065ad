//! End-to-end compilation tests against the public API.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sass::{
    compile_string, CanonicalUrl, CompileError, Deprecation, Importer, Loaded, Logger, Number,
    Options, OutputStyle, Span, Syntax, Value, WarnEvent,
};
use url::Url;

/// A logger that records every warning it receives.
struct Recorder {
    warnings: RefCell<Vec<(String, Option<Deprecation>)>>,
}

impl Recorder {
    fn new() -> Rc<Recorder> {
        Rc::new(Recorder {
            warnings: RefCell::new(Vec::new()),
        })
    }
}

impl Logger for Recorder {
    fn warn(&self, message: &str, event: &WarnEvent<'_>) {
        self.warnings
            .borrow_mut()
            .push((String::from(message), event.deprecation));
    }

    fn debug(&self, _message: &str, _span: Option<&Span>) {}
}

/// Serves stylesheets from an in-memory map under the `mem:` scheme.
struct MapImporter {
    files: HashMap<String, String>,
}

impl MapImporter {
    fn new(files: &[(&str, &str)]) -> Rc<MapImporter> {
        Rc::new(MapImporter {
            files: files
                .iter()
                .map(|(k, v)| (String::from(*k), String::from(*v)))
                .collect(),
        })
    }
}

impl Importer for MapImporter {
    fn canonicalize(
        &self,
        url: &str,
        _from_import: bool,
    ) -> Result<Option<CanonicalUrl>, CompileError> {
        let name = url.strip_prefix("mem:").unwrap_or(url);
        if self.files.contains_key(name) {
            Ok(Some(CanonicalUrl::new(
                Url::parse(&format!("mem:{name}")).unwrap(),
            )))
        } else {
            Ok(None)
        }
    }

    fn load(&self, url: &CanonicalUrl) -> Result<Option<Loaded>, CompileError> {
        let name = url.as_str().strip_prefix("mem:").unwrap();
        Ok(self.files.get(name).map(|contents| Loaded {
            contents: contents.clone(),
            syntax: Syntax::Scss,
            source_map_url: None,
        }))
    }

    fn name(&self) -> String {
        String::from("in-memory")
    }
}

fn compile(source: &str) -> String {
    compile_string(source, &Options::new().with_logger(Rc::new(sass::NullLogger)))
        .unwrap()
        .css
}

#[test]
fn arithmetic_in_declarations() {
    assert_eq!(compile("a { b: 1 + 2 }"), "a {\n  b: 3;\n}");
}

#[test]
fn variables_and_compressed_style() {
    let options = Options::new().with_style(OutputStyle::Compressed);
    let result = compile_string("$x: 1; a { b: $x }", &options).unwrap();
    assert_eq!(result.css, "a{b:1}");
}

#[test]
fn use_exposes_namespaced_variables() {
    let options = Options::new()
        .with_importer(MapImporter::new(&[("other", "$c: red;")]))
        .with_logger(Rc::new(sass::NullLogger));
    let result = compile_string("@use 'other'; a { b: other.$c }", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: red;\n}");
}

#[test]
fn extend_adds_selectors() {
    assert_eq!(
        compile("a { color: red } b { @extend a }"),
        "a, b {\n  color: red;\n}"
    );
}

#[test]
fn if_else_branches() {
    assert_eq!(
        compile("@if true { a { b: 1 } } @else { a { b: 2 } }"),
        "a {\n  b: 1;\n}"
    );
    assert_eq!(
        compile("@if false { a { b: 1 } } @else { a { b: 2 } }"),
        "a {\n  b: 2;\n}"
    );
    assert_eq!(
        compile("@if false { a { b: 1 } } @else if true { a { b: 3 } }"),
        "a {\n  b: 3;\n}"
    );
}

#[test]
fn comments_survive_and_warn_nothing() {
    let recorder = Recorder::new();
    let options = Options::new()
        .with_logger(recorder.clone())
        .with_source_map(true);

    let result = compile_string("/* c */", &options).unwrap();
    assert_eq!(result.css, "/* c */");
    assert!(recorder.warnings.borrow().is_empty());

    let map = result.source_map.unwrap();
    assert_eq!(map.sources.len(), 1);
    assert!(map.sources[0].starts_with("data:;charset=utf-8,"));
}

#[test]
fn mixins_bind_arguments_and_defaults() {
    assert_eq!(
        compile("@mixin pad($n: 1) { padding: $n * 8px; } .card { @include pad(2); }"),
        ".card {\n  padding: 16px;\n}"
    );
    assert_eq!(
        compile("@mixin pad($n: 1) { padding: $n * 8px; } .card { @include pad; }"),
        ".card {\n  padding: 8px;\n}"
    );
    assert_eq!(
        compile("@mixin pad($n: 1) { padding: $n * 8px; } .card { @include pad($n: 3); }"),
        ".card {\n  padding: 24px;\n}"
    );
}

#[test]
fn functions_return_values() {
    assert_eq!(
        compile("@function double($n) { @return $n * 2; } a { width: double(4px); }"),
        "a {\n  width: 8px;\n}"
    );
}

#[test]
fn content_blocks_run_at_the_include_site() {
    assert_eq!(
        compile("@mixin wrap { a { @content; } } @include wrap { b: 1; }"),
        "a {\n  b: 1;\n}"
    );
}

#[test]
fn each_destructures_maps() {
    assert_eq!(
        compile("@each $name, $size in (small: 10px, large: 20px) { .#{$name} { font-size: $size; } }"),
        ".small {\n  font-size: 10px;\n}\n\n.large {\n  font-size: 20px;\n}"
    );
}

#[test]
fn for_loops_are_inclusive_and_exclusive() {
    assert_eq!(
        compile("@for $i from 1 through 2 { .m#{$i} { margin: $i * 1px; } }"),
        ".m1 {\n  margin: 1px;\n}\n\n.m2 {\n  margin: 2px;\n}"
    );
    assert_eq!(
        compile("@for $i from 1 to 2 { .m#{$i} { margin: $i * 1px; } }"),
        ".m1 {\n  margin: 1px;\n}"
    );
}

#[test]
fn nested_selectors_resolve_parents() {
    assert_eq!(
        compile("a { &.x { b: c } }"),
        "a.x {\n  b: c;\n}"
    );
    assert_eq!(
        compile(".btn { &-primary { b: c } }"),
        ".btn-primary {\n  b: c;\n}"
    );
    assert_eq!(compile("a { b { c: d } }"), "a b {\n  c: d;\n}");
}

#[test]
fn media_bubbles_and_wraps_the_rule() {
    assert_eq!(
        compile("a { b: c; @media screen { d: e; } }"),
        "a {\n  b: c;\n}\n\n@media screen {\n  a {\n    d: e;\n  }\n}"
    );
}

#[test]
fn nested_media_queries_merge() {
    assert_eq!(
        compile("@media screen { @media (min-width: 100px) { a { b: c } } }"),
        "@media screen {\n  @media screen and (min-width: 100px) {\n    a {\n      b: c;\n    }\n  }\n}"
    );
}

#[test]
fn placeholder_extension() {
    assert_eq!(
        compile("%base { c: d } a { @extend %base }"),
        "a {\n  c: d;\n}"
    );
}

#[test]
fn mandatory_extend_must_match() {
    let err = compile_string(
        "a { @extend .nope }",
        &Options::new().with_logger(Rc::new(sass::NullLogger)),
    )
    .unwrap_err();
    assert!(err.to_string().contains("The target selector was not found."));

    assert_eq!(compile("a { @extend .nope !optional; b: c }"), "a {\n  b: c;\n}");
}

#[test]
fn important_passes_through() {
    assert_eq!(
        compile("a { b: c !important }"),
        "a {\n  b: c !important;\n}"
    );
}

#[test]
fn builtin_functions_work() {
    assert_eq!(
        compile("a { b: to-upper-case(hello) }"),
        "a {\n  b: HELLO;\n}"
    );
    assert_eq!(
        compile("$m: (x: 4px); a { b: map-get($m, x) }"),
        "a {\n  b: 4px;\n}"
    );
    assert_eq!(compile("a { b: length(1 2 3) }"), "a {\n  b: 3;\n}");
    assert_eq!(compile("a { b: nth((x y z), 2) }"), "a {\n  b: y;\n}");
}

#[test]
fn unknown_functions_render_as_css() {
    assert_eq!(
        compile("a { filter: blur(4px) }"),
        "a {\n  filter: blur(4px);\n}"
    );
    assert_eq!(
        compile("a { width: calc(100% - 10px) }"),
        "a {\n  width: calc(100% - 10px);\n}"
    );
}

#[test]
fn custom_functions_are_invoked() {
    let options = Options::new().with_function(
        "triple($n)",
        Rc::new(|args: &[Value], _ctx: &mut sass::EvalContext<'_>| match args.first() {
            Some(Value::Number(n)) => Ok(Value::Number(Number::new(n.value * 3.0))),
            _ => Err(String::from("$n: expected a number.")),
        }),
    );
    let result = compile_string("a { b: triple(2) }", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 6;\n}");
}

#[test]
fn indented_syntax_compiles() {
    let options = Options::new().with_syntax(Syntax::Indented);
    let result = compile_string("a\n  b: 1px + 2px\n", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 3px;\n}");
}

#[test]
fn plain_css_round_trips() {
    let first = compile("a { b: 1 + 2 }");
    let options = Options::new().with_syntax(Syntax::Css);
    let second = compile_string(&first, &options).unwrap();
    assert_eq!(first, second.css);
}

#[test]
fn output_is_deterministic() {
    let source = "@each $n in (1, 2) { .x#{$n} { y: $n } } a { b: str-length(\"abc\") }";
    assert_eq!(compile(source), compile(source));
}

#[test]
fn indent_width_is_validated() {
    let err = compile_string("a { b: c }", &Options::new().with_indent_width(11)).unwrap_err();
    assert!(matches!(err, CompileError::Usage(_)));

    let result = compile_string(
        "a { b: c }",
        &Options::new().with_indent_width(4),
    )
    .unwrap();
    assert_eq!(result.css, "a {\n    b: c;\n}");
}

#[test]
fn conflicting_deprecation_sets_are_rejected() {
    let err = compile_string(
        "a { b: c }",
        &Options::new()
            .with_silenced_deprecations([Deprecation::SlashDiv])
            .with_fatal_deprecations([Deprecation::SlashDiv]),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Usage(_)));
}

#[test]
fn missing_imports_point_at_the_directive() {
    let options = Options::new().with_logger(Rc::new(sass::NullLogger));
    let err = compile_string("@use 'definitely-missing';", &options).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Can't find stylesheet to import."));
    // The span points at the @use rule on line 1.
    assert!(message.contains("1:1"));
}

#[test]
fn module_cycles_name_the_participants() {
    let options = Options::new()
        .with_importer(MapImporter::new(&[
            ("a", "@use 'b';"),
            ("b", "@use 'a';"),
        ]))
        .with_logger(Rc::new(sass::NullLogger));
    let err = compile_string("@use 'a';", &options).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Module loop"));
    assert!(message.contains("mem:a"));
    assert!(message.contains("mem:b"));
}

#[test]
fn modules_evaluate_once() {
    // Both paths load `shared`; its CSS must appear exactly once.
    let options = Options::new()
        .with_importer(MapImporter::new(&[
            ("one", "@use 'shared';"),
            ("two", "@use 'shared';"),
            ("shared", ".shared { a: b }"),
        ]))
        .with_logger(Rc::new(sass::NullLogger));
    let result = compile_string("@use 'one'; @use 'two';", &options).unwrap();
    assert_eq!(result.css.matches(".shared").count(), 1);
}

#[test]
fn use_with_configures_defaults() {
    let options = Options::new()
        .with_importer(MapImporter::new(&[(
            "lib",
            "$size: 4px !default; .box { width: $size; }",
        )]))
        .with_logger(Rc::new(sass::NullLogger));
    let result = compile_string("@use 'lib' with ($size: 9px);", &options).unwrap();
    assert_eq!(result.css, ".box {\n  width: 9px;\n}");
}

#[test]
fn forward_reexports_with_prefix() {
    let options = Options::new()
        .with_importer(MapImporter::new(&[
            ("middle", "@forward 'base' as base-*;"),
            ("base", "$size: 5px;"),
        ]))
        .with_logger(Rc::new(sass::NullLogger));
    let result =
        compile_string("@use 'middle'; a { b: middle.$base-size }", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 5px;\n}");
}

#[test]
fn legacy_import_is_inline() {
    let options = Options::new()
        .with_importer(MapImporter::new(&[("vars", "$c: 3px;")]))
        .with_logger(Rc::new(sass::NullLogger));
    let result = compile_string("@import 'vars'; a { b: $c }", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 3px;\n}");
}

#[test]
fn plain_css_imports_pass_through() {
    assert_eq!(
        compile("@import \"other.css\";"),
        "@import \"other.css\";"
    );
    assert_eq!(
        compile("@import url(http://example.com/x.css);"),
        "@import url(http://example.com/x.css);"
    );
}

#[test]
fn slash_division_requires_script_context() {
    // A plain slash stays in the output.
    assert_eq!(compile("a { font: 12px/30px }"), "a {\n  font: 12px/30px;\n}");

    // A variable operand makes it division (and warns).
    let recorder = Recorder::new();
    let options = Options::new().with_logger(recorder.clone());
    let result = compile_string("$x: 10px; a { b: $x / 2 }", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 5px;\n}");
    assert!(recorder
        .warnings
        .borrow()
        .iter()
        .any(|(_, d)| *d == Some(Deprecation::SlashDiv)));

    // Parenthesized division is unambiguous: no warning.
    let recorder = Recorder::new();
    let options = Options::new().with_logger(recorder.clone());
    let result = compile_string("a { b: (10px / 2) }", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 5px;\n}");
    assert!(recorder.warnings.borrow().is_empty());
}

#[test]
fn undefined_variables_carry_spans_and_traces() {
    let options = Options::new().with_logger(Rc::new(sass::NullLogger));
    let err = compile_string(
        "@mixin m { b: $nope; }\na { @include m; }",
        &options,
    )
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Undefined variable"));
    assert!(message.contains("m()"));
    assert!(message.contains("root stylesheet"));
}

#[test]
fn at_error_fails_the_compilation() {
    let options = Options::new().with_logger(Rc::new(sass::NullLogger));
    let err = compile_string("@error \"boom\";", &options).unwrap_err();
    assert!(err.to_string().contains("boom"));
}

#[test]
fn warn_reaches_the_logger() {
    let recorder = Recorder::new();
    let options = Options::new().with_logger(recorder.clone());
    compile_string("@warn \"careful\"; a { b: c }", &options).unwrap();

    let warnings = recorder.warnings.borrow();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, "careful");
    assert_eq!(warnings[0].1, None);
}
