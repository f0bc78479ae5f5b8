use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_parse_empty_manifest() {
    let manifest = Manifest::parse("").unwrap();
    assert_eq!(manifest, Manifest::default());
    assert_eq!(manifest.entry(), "main");
}

#[test]
fn test_parse_full_manifest() {
    let content = r#"
[package]
name = "demo"
main = "main.omn"

[modules]
search_paths = ["lib", "vendor/omn"]

[runtime]
entry = "start"
"#;

    let manifest = Manifest::parse(content).unwrap();
    assert_eq!(manifest.package.name.as_deref(), Some("demo"));
    assert_eq!(manifest.package.main.as_deref(), Some("main.omn"));
    assert_eq!(manifest.modules.search_paths, vec!["lib", "vendor/omn"]);
    assert_eq!(manifest.entry(), "start");
}

#[test]
fn test_rejects_invalid_values() {
    assert!(matches!(
        Manifest::parse("[runtime]\nentry = \"not a name\""),
        Err(ManifestError::Validation(_))
    ));
    assert!(matches!(
        Manifest::parse("[package]\nname = \"  \""),
        Err(ManifestError::Validation(_))
    ));
    assert!(matches!(
        Manifest::parse("[modules]\nsearch_paths = \"lib\""),
        Err(ManifestError::Parse(_))
    ));
}

#[test]
fn test_discover_prefers_program_directory() {
    let cwd = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    std::fs::write(cwd.path().join(MANIFEST_FILE), "[package]\nname = \"cwd\"").unwrap();
    std::fs::write(
        project.path().join(MANIFEST_FILE),
        "[package]\nname = \"proj\"\n[modules]\nsearch_paths = [\"lib\"]",
    )
    .unwrap();

    let program = project.path().join("main.omn");
    let found = Project::discover(Some(&program), cwd.path()).unwrap().unwrap();
    assert_eq!(found.manifest.package.name.as_deref(), Some("proj"));
    assert_eq!(
        found.search_paths(),
        vec![project.path().to_path_buf(), project.path().join("lib")]
    );

    let fallback = Project::discover(None, cwd.path()).unwrap().unwrap();
    assert_eq!(fallback.manifest.package.name.as_deref(), Some("cwd"));
}

#[test]
fn test_discover_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(Project::discover(None, dir.path()).unwrap(), None);
}

#[test]
fn test_main_file_is_relative_to_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(MANIFEST_FILE), "[package]\nmain = \"app.omn\"").unwrap();
    let project = Project::discover(None, dir.path()).unwrap().unwrap();
    assert_eq!(project.main_file(), Some(dir.path().join("app.omn")));
}

#[test]
fn test_broken_manifest_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(MANIFEST_FILE), "[package\nname =").unwrap();
    assert!(matches!(
        Project::discover(None, dir.path()),
        Err(ManifestError::Parse(_))
    ));
}
