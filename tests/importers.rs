//! Filesystem loading, load paths, and deprecation policy end to end.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use sass::{
    compile, compile_string, CompileError, Deprecation, Logger, Options, Span, WarnEvent,
};

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

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn compiles_files_with_relative_uses() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "style.scss", "@use 'lib';\na { b: lib.$v }\n");
    write(dir.path(), "_lib.scss", "$v: 7px;\n");

    let options = Options::new().with_logger(Rc::new(sass::NullLogger));
    let result = compile(dir.path().join("style.scss"), &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 7px;\n}");

    // Load order: the entrypoint first, then its dependency.
    assert_eq!(result.loaded_urls.len(), 2);
    assert!(result.loaded_urls[0].path().ends_with("style.scss"));
    assert!(result.loaded_urls[1].path().ends_with("_lib.scss"));
}

#[test]
fn subdirectories_and_indexes_resolve() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "style.scss", "@use 'widgets';\n");
    write(
        dir.path(),
        "widgets/_index.scss",
        ".widget { color: teal }\n",
    );

    let options = Options::new().with_logger(Rc::new(sass::NullLogger));
    let result = compile(dir.path().join("style.scss"), &options).unwrap();
    assert_eq!(result.css, ".widget {\n  color: teal;\n}");
}

#[test]
fn load_paths_are_consulted_in_order() {
    let project = tempfile::tempdir().unwrap();
    let vendor_a = tempfile::tempdir().unwrap();
    let vendor_b = tempfile::tempdir().unwrap();

    write(project.path(), "style.scss", "@use 'theme';\na { b: theme.$c }\n");
    write(vendor_a.path(), "_theme.scss", "$c: first;\n");
    write(vendor_b.path(), "_theme.scss", "$c: second;\n");

    let options = Options::new()
        .with_load_path(vendor_a.path())
        .with_load_path(vendor_b.path())
        .with_logger(Rc::new(sass::NullLogger));
    let result = compile(project.path().join("style.scss"), &options).unwrap();
    assert_eq!(result.css, "a {\n  b: first;\n}");
}

#[test]
fn ambiguous_imports_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "style.scss", "@use 'lib';\n");
    write(dir.path(), "lib.scss", "$v: 1;\n");
    write(dir.path(), "_lib.scss", "$v: 2;\n");

    let options = Options::new().with_logger(Rc::new(sass::NullLogger));
    let err = compile(dir.path().join("style.scss"), &options).unwrap_err();
    assert!(err.to_string().contains("not clear which file to import"));
}

#[test]
fn missing_entry_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options::new().with_logger(Rc::new(sass::NullLogger));
    let err = compile(dir.path().join("nope.scss"), &options).unwrap_err();
    assert!(matches!(err, CompileError::Io(_)));
}

#[test]
fn quiet_deps_suppresses_dependency_warnings() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "style.scss", "@use 'dep';\n");
    write(dir.path(), "_dep.scss", "$x: 10px;\na { b: $x / 2 }\n");

    // Without quiet-deps the slash-div warning surfaces.
    let recorder = Recorder::new();
    let options = Options::new().with_logger(recorder.clone());
    compile(dir.path().join("style.scss"), &options).unwrap();
    assert_eq!(recorder.warnings.borrow().len(), 1);

    // With quiet-deps it is dropped: the span is in a dependency.
    let recorder = Recorder::new();
    let options = Options::new()
        .with_logger(recorder.clone())
        .with_quiet_deps(true);
    compile(dir.path().join("style.scss"), &options).unwrap();
    assert!(recorder.warnings.borrow().is_empty());
}

#[test]
fn fatal_deprecations_fail_even_in_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "style.scss", "@use 'dep';\n");
    write(dir.path(), "_dep.scss", "$x: 10px;\na { b: $x / 2 }\n");

    let options = Options::new()
        .with_logger(Rc::new(sass::NullLogger))
        .with_quiet_deps(true)
        .with_fatal_deprecations([Deprecation::SlashDiv]);
    let err = compile(dir.path().join("style.scss"), &options).unwrap_err();
    assert!(err.to_string().contains("slash-div"));
}

#[test]
fn silenced_deprecations_stay_silent() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "style.scss", "$x: 10px;\na { b: $x / 2 }\n");

    let recorder = Recorder::new();
    let options = Options::new()
        .with_logger(recorder.clone())
        .with_silenced_deprecations([Deprecation::SlashDiv]);
    let result = compile(dir.path().join("style.scss"), &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 5px;\n}");
    assert!(recorder.warnings.borrow().is_empty());
}

#[test]
fn repeated_warnings_are_limited_and_summarized() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "style.scss",
        "$x: 10px;\n@for $i from 1 through 8 { .a#{$i} { b: $x / 2 } }\n",
    );

    let recorder = Recorder::new();
    let options = Options::new().with_logger(recorder.clone());
    compile(dir.path().join("style.scss"), &options).unwrap();

    // Five warnings from the same span, then one summary line.
    let warnings = recorder.warnings.borrow();
    assert_eq!(warnings.len(), 6);
    assert!(warnings[5].0.contains("repetitive deprecation warnings omitted"));

    // Verbose mode reports every occurrence.
    drop(warnings);
    let recorder = Recorder::new();
    let options = Options::new()
        .with_logger(recorder.clone())
        .with_verbose(true);
    compile(dir.path().join("style.scss"), &options).unwrap();
    assert_eq!(recorder.warnings.borrow().len(), 8);
}

#[test]
fn source_maps_use_file_urls_for_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "style.scss", "a { b: c }\n");

    let options = Options::new()
        .with_logger(Rc::new(sass::NullLogger))
        .with_source_map(true);
    let result = compile(dir.path().join("style.scss"), &options).unwrap();

    let map = result.source_map.unwrap();
    assert_eq!(map.sources.len(), 1);
    assert!(map.sources[0].starts_with("file://"));
    assert!(map.sources[0].ends_with("style.scss"));

    // The JSON form is well-formed source-map v3.
    let json: serde_json::Value = serde_json::from_str(&map.to_json()).unwrap();
    assert_eq!(json["version"], 3);
    assert!(json["mappings"].as_str().unwrap().contains("AA"));
}

#[test]
fn string_compilations_resolve_against_the_cwd_importer() {
    // A string entrypoint has no URL; relative imports go through the
    // fallback importer, which we point at a temp dir here.
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "_helper.scss", "$h: 2px;\n");

    let options = Options::new()
        .with_logger(Rc::new(sass::NullLogger))
        .with_entrypoint_importer(Rc::new(sass::FilesystemImporter::new(dir.path())));
    let result = compile_string("@use 'helper';\na { b: helper.$h }", &options).unwrap();
    assert_eq!(result.css, "a {\n  b: 2px;\n}");
}
