// End-to-end build tests over a throwaway project tree
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use webforge::config::manifest::{Environment, Manifest};
use webforge::config::tokens::TokenTable;
use webforge::error::ForgeError;
use webforge::graph::GraphError;
use webforge::runner::{TaskStatus, run_build};

const MANIFEST: &str = r#"
    [project]
    metadata = "package.json"
    site_root = "dist"

    [project.overlays]
    production = "package.production.json"

    [[task]]
    name = "styles"
    sources = ["css/**/*.css"]
    dest = "dist/css"
    bundle = "main.bundle.css"

    [[task.stages]]
    kind = "concat"

    [[task.stages]]
    kind = "minify-css"
    only = "production"
    rename = ".min.css"
    checkpoint = true

    [[task]]
    name = "scripts"
    sources = ["js/**/*.js"]
    dest = "dist/js"
    bundle = "main.bundle.js"

    [[task.stages]]
    kind = "lint-js"

    [[task.stages]]
    kind = "concat"

    [[task.stages]]
    kind = "minify-js"
    only = "production"
    rename = ".min.js"

    [[task]]
    name = "templates"
    sources = ["templates/**/*.html"]
    dest = "dist"
    depends_on = ["scripts"]

    [[task.stages]]
    kind = "replace-tokens"

    [[task.stages]]
    kind = "prettify"
    only = "development"
"#;

fn write_project(dir: &Path) {
    fs::create_dir_all(dir.join("css")).unwrap();
    fs::create_dir_all(dir.join("js")).unwrap();
    fs::create_dir_all(dir.join("templates")).unwrap();

    fs::write(
        dir.join("css/a.css"),
        "/* base */\nbody {\n    margin : 0 ;\n}\n",
    )
    .unwrap();
    fs::write(dir.join("css/b.css"), "h1 {\n    color: red;\n}\n").unwrap();

    fs::write(
        dir.join("js/app.js"),
        "// entry\nfunction greet(name) {\n    return \"hi \" + name;\n}\n",
    )
    .unwrap();

    fs::write(
        dir.join("templates/index.html"),
        "<html>\n<head>\n<title>@_@name@_@ @_@version@_@</title>\n</head>\n<body>\n<p>hello</p>\n</body>\n</html>\n",
    )
    .unwrap();

    fs::write(
        dir.join("package.json"),
        "{\"name\": \"demo\", \"version\": \"0.1.0\"}",
    )
    .unwrap();
    fs::write(dir.join("package.production.json"), "{\"version\": \"1.2.3\"}").unwrap();
}

fn load(dir: &Path, env: Environment) -> (Manifest, TokenTable) {
    let manifest = Manifest::parse(MANIFEST, dir.to_path_buf()).unwrap();
    let tokens = TokenTable::load(&manifest, env).unwrap();
    (manifest, tokens)
}

#[tokio::test]
async fn development_build_skips_production_stages() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    let (manifest, tokens) = load(dir.path(), Environment::Development);

    let report = run_build(&manifest, &tokens, Environment::Development, None)
        .await
        .unwrap();
    assert!(report.is_success());

    // Concatenated but not minified
    let css = fs::read_to_string(dir.path().join("dist/css/main.bundle.css")).unwrap();
    assert!(css.contains("/* base */"));
    assert!(css.contains("color: red"));
    assert!(!dir.path().join("dist/css/main.bundle.min.css").exists());

    let js = fs::read_to_string(dir.path().join("dist/js/main.bundle.js")).unwrap();
    assert!(js.contains("// entry"));
    assert!(!dir.path().join("dist/js/main.bundle.min.js").exists());

    // Tokens substituted from the base metadata, then prettified
    let html = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(html.contains("demo 0.1.0"));
    assert!(html.contains("    <head>"));
}

#[tokio::test]
async fn production_build_minifies_and_keeps_checkpoint() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    let (manifest, tokens) = load(dir.path(), Environment::Production);

    let report = run_build(&manifest, &tokens, Environment::Production, None)
        .await
        .unwrap();
    assert!(report.is_success());

    // Both the checkpointed intermediate and the minified bundle are retained
    let plain = fs::read_to_string(dir.path().join("dist/css/main.bundle.css")).unwrap();
    assert!(plain.contains("/* base */"));
    let min = fs::read_to_string(dir.path().join("dist/css/main.bundle.min.css")).unwrap();
    assert!(!min.contains("/*"));
    assert!(min.contains("body{margin:0}"));

    // Scripts declare no checkpoint, so only the compacted bundle is written
    assert!(!dir.path().join("dist/js/main.bundle.js").exists());
    let js = fs::read_to_string(dir.path().join("dist/js/main.bundle.min.js")).unwrap();
    assert!(!js.contains("// entry"));
    assert!(js.contains("function greet(name) {"));

    // Overlay wins; prettify is development-only
    let html = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(html.contains("demo 1.2.3"));
    assert!(!html.contains("    <head>"));
}

#[tokio::test]
async fn lint_violation_aborts_task_and_skips_dependents() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    fs::write(dir.path().join("js/bad.js"), "var x = 1;\ndebugger;\n").unwrap();
    let (manifest, tokens) = load(dir.path(), Environment::Development);

    let report = run_build(&manifest, &tokens, Environment::Development, None)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.outcomes.get("scripts"),
        Some(TaskStatus::Failed(_))
    ));
    // Dependent task never starts, unrelated task still runs
    assert_eq!(report.outcomes.get("templates"), Some(&TaskStatus::Skipped));
    assert_eq!(report.outcomes.get("styles"), Some(&TaskStatus::Succeeded));

    assert!(dir.path().join("dist/css/main.bundle.css").exists());
    assert!(!dir.path().join("dist/js/main.bundle.js").exists());
    assert!(!dir.path().join("dist/index.html").exists());

    // The failure carries file/line context
    if let Some(TaskStatus::Failed(message)) = report.outcomes.get("scripts") {
        assert!(message.contains("bad.js:2"), "unexpected message: {message}");
    }
}

#[tokio::test]
async fn dependency_cycle_fails_before_any_task_runs() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let text = r#"
        [[task]]
        name = "a"
        sources = ["css/**/*.css"]
        dest = "dist"
        bundle = "a.css"
        depends_on = ["b"]

        [[task.stages]]
        kind = "concat"

        [[task]]
        name = "b"
        sources = ["css/**/*.css"]
        dest = "dist"
        bundle = "b.css"
        depends_on = ["a"]

        [[task.stages]]
        kind = "concat"
    "#;
    let manifest = Manifest::parse(text, dir.path().to_path_buf()).unwrap();
    let tokens = TokenTable::default();

    let err = run_build(&manifest, &tokens, Environment::Development, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ForgeError::Graph(GraphError::CycleDetected(_, _))
    ));
    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn execution_order_respects_dependencies() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    let (manifest, tokens) = load(dir.path(), Environment::Development);

    let report = run_build(&manifest, &tokens, Environment::Development, None)
        .await
        .unwrap();

    let names: Vec<&str> = report.outcomes.keys().map(String::as_str).collect();
    let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(pos("scripts") < pos("templates"));
    assert_eq!(names.len(), 3);
}

#[tokio::test]
async fn task_filter_runs_only_selected_tasks() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    let (manifest, tokens) = load(dir.path(), Environment::Development);

    let only: HashSet<String> = ["styles".to_string()].into_iter().collect();
    let report = run_build(&manifest, &tokens, Environment::Development, Some(&only))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 1);
    assert!(dir.path().join("dist/css/main.bundle.css").exists());
    assert!(!dir.path().join("dist/js").exists());
    assert!(!dir.path().join("dist/index.html").exists());
}

#[tokio::test]
async fn missing_metadata_file_fails_fast() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    fs::remove_file(dir.path().join("package.json")).unwrap();

    let manifest = Manifest::parse(MANIFEST, dir.path().to_path_buf()).unwrap();
    let err = TokenTable::load(&manifest, Environment::Development).unwrap_err();
    assert!(matches!(err, ForgeError::MissingFile(_)));
}
