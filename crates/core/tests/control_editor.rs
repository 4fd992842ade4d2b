//! End-to-end tests for editing `debian/control` trees on disk.
//!
//! Each test builds a small `debian/` directory in a temp dir, runs an edit
//! through the public API and checks the bytes that end up on disk.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use controledit_core::config::EditorConfig;
use controledit_core::control::Paragraph;
use controledit_core::editor::{
    update_control, CommitOutcome, ControlEditor, ParagraphCallback, SeriesEditor,
};
use controledit_core::errors::EditError;
use controledit_core::relations::ensure_minimum_version;

// ===========================================================================
// Helpers
// ===========================================================================

struct Tree {
    _dir: TempDir,
    debian: PathBuf,
}

impl Tree {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let debian = dir.path().join("debian");
        std::fs::create_dir_all(debian.join("patches")).unwrap();
        for (name, content) in files {
            std::fs::write(debian.join(name), content).unwrap();
        }
        Self { _dir: dir, debian }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.debian.join(name)
    }

    fn control(&self) -> PathBuf {
        self.path("control")
    }

    fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).unwrap()
    }
}

fn config_with(substitutions: &[(&str, &str)]) -> EditorConfig {
    let mut config = EditorConfig::default();
    for (name, value) in substitutions {
        config
            .template
            .substitutions
            .insert(name.to_string(), value.to_string());
    }
    config
}

fn update(
    path: &Path,
    source: Option<ParagraphCallback<'_>>,
    binary: Option<ParagraphCallback<'_>>,
) -> Result<bool, EditError> {
    update_control(path, &EditorConfig::default(), source, binary)
}

const GENERATED: &str = "\
# DO NOT EDIT
# This file was generated by blah

Source: blah
Testsuite: autopkgtest

";

const WITH_BINARY: &str = "\
Source: blah
Testsuite: autopkgtest

Package: blah
Description: Some description
 And there are more lines
 And more lines
";

// ===========================================================================
// Generated files
// ===========================================================================

#[test]
fn test_do_not_edit() {
    let tree = Tree::new(&[("control", GENERATED)]);
    let err = update(
        &tree.control(),
        Some(&mut |p: &mut Paragraph| p.set("Source", "blah1")),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, EditError::GeneratedFile { .. }));
    assert_eq!(tree.read("control"), GENERATED);
}

#[test]
fn test_do_not_edit_no_change() {
    let tree = Tree::new(&[("control", GENERATED)]);
    assert!(!update(&tree.control(), None, None).unwrap());
}

#[test]
fn test_custom_marker_from_config() {
    let tree = Tree::new(&[
        ("control", "# Generated by gen-control\nSource: blah\n"),
        (
            "controledit.toml",
            "[generated]\nmarkers = ['^# Generated by gen-control']\n",
        ),
    ]);
    let config = EditorConfig::load_and_resolve(tree.path("controledit.toml")).unwrap();
    let mut editor = ControlEditor::open_with(tree.control(), &config).unwrap();
    assert!(editor.is_generated());
    assert!(matches!(
        editor.source_mut(),
        Err(EditError::GeneratedFile { .. })
    ));

    let editor = ControlEditor::open(tree.control()).unwrap();
    assert!(!editor.is_generated());
}

// ===========================================================================
// Plain edits
// ===========================================================================

#[test]
fn test_add_binary() {
    let tree = Tree::new(&[("control", WITH_BINARY)]);
    let mut editor = ControlEditor::open(tree.control()).unwrap();
    editor
        .add_binary([("Package", "foo"), ("Description", "A new package foo")])
        .unwrap();
    let names: Vec<_> = editor.binaries().filter_map(|b| b.get("Package")).collect();
    assert_eq!(names, ["blah", "foo"]);
    assert_eq!(editor.commit().unwrap(), CommitOutcome::Written);

    assert_eq!(
        tree.read("control"),
        format!("{WITH_BINARY}\nPackage: foo\nDescription: A new package foo\n")
    );
}

#[test]
fn test_list_binaries() {
    let tree = Tree::new(&[("control", WITH_BINARY)]);
    let editor = ControlEditor::open(tree.control()).unwrap();
    assert_eq!(
        editor.binaries().next().and_then(|b| b.get("Package")),
        Some("blah")
    );
    assert_eq!(
        editor.binary("blah").and_then(|b| b.get("Description")),
        Some("Some description\n And there are more lines\n And more lines")
    );
}

#[test]
fn test_create() {
    let tree = Tree::new(&[]);
    let mut editor = ControlEditor::create(tree.control()).unwrap();
    editor.source_mut().unwrap().set("Source", "foo").unwrap();
    editor.commit().unwrap();
    assert_eq!(tree.read("control"), "Source: foo\n");
}

#[test]
fn test_open_missing() {
    let tree = Tree::new(&[]);
    assert!(matches!(
        ControlEditor::open(tree.control()),
        Err(EditError::Io { .. })
    ));
}

#[test]
fn test_new_field_keeps_comment() {
    let tree = Tree::new(&[(
        "control",
        "Source: blah\n# A comment\nTestsuite: autopkgtest\n\n",
    )]);
    assert!(update(
        &tree.control(),
        Some(&mut |p: &mut Paragraph| p.set("NewField", "New Field")),
        None,
    )
    .unwrap());
    assert_eq!(
        tree.read("control"),
        "Source: blah\n# A comment\nTestsuite: autopkgtest\nNewField: New Field\n\n"
    );
}

#[test]
fn test_comment_between_paragraph_fields() {
    let tree = Tree::new(&[(
        "control",
        "Source: blah\nTestsuite: autopkgtest\n\nPackage: blah\nDescription: Some description\n And there are more lines\n And more lines\n# A comment\nMulti-Arch: foreign\n",
    )]);
    update(
        &tree.control(),
        Some(&mut |p: &mut Paragraph| p.set("NewField", "New Field")),
        None,
    )
    .unwrap();
    assert_eq!(
        tree.read("control"),
        "Source: blah\nTestsuite: autopkgtest\nNewField: New Field\n\nPackage: blah\nDescription: Some description\n And there are more lines\n And more lines\n# A comment\nMulti-Arch: foreign\n"
    );
}

#[test]
fn test_embedded_comment_unpreservable() {
    let original = "Source: blah\nBuild-Depends: debhelper,\n# needed for tests\n python3\n";
    let tree = Tree::new(&[("control", original)]);
    let err = update(
        &tree.control(),
        Some(&mut |p: &mut Paragraph| p.set("Build-Depends", "debhelper")),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, EditError::FormattingUnpreservable { .. }));
    assert_eq!(tree.read("control"), original);
}

#[test]
fn test_modify_source() {
    let tree = Tree::new(&[("control", "Source: blah\nTestsuite: autopkgtest\n")]);
    assert!(update(
        &tree.control(),
        Some(&mut |p: &mut Paragraph| p.set("XS-Vcs-Git", "git://github.com/example/example")),
        None,
    )
    .unwrap());
    assert_eq!(
        tree.read("control"),
        "Source: blah\nTestsuite: autopkgtest\nXS-Vcs-Git: git://github.com/example/example\n"
    );
}

#[test]
fn test_modify_binary() {
    let tree = Tree::new(&[(
        "control",
        "Source: blah\nTestsuite: autopkgtest\n\nPackage: libblah\nSection: extra\n",
    )]);
    assert!(update(
        &tree.control(),
        None,
        Some(&mut |p: &mut Paragraph| p.set("Arch", "all")),
    )
    .unwrap());
    assert_eq!(
        tree.read("control"),
        "Source: blah\nTestsuite: autopkgtest\n\nPackage: libblah\nSection: extra\nArch: all\n"
    );
}

#[test]
fn test_doesnt_strip_whitespace() {
    let original = "Source: blah\nTestsuite: autopkgtest\n\n";
    let tree = Tree::new(&[("control", original)]);
    assert!(!update(&tree.control(), None, None).unwrap());
    assert_eq!(tree.read("control"), original);
}

#[test]
fn test_description_stays_last() {
    let tree = Tree::new(&[(
        "control",
        "Source: blah\nTestsuite: autopkgtest\n\nPackage: libblah\nSection: extra\nDescription: foo\n bar\n\n",
    )]);
    assert!(update(
        &tree.control(),
        None,
        Some(&mut |p: &mut Paragraph| p.set("Arch", "all")),
    )
    .unwrap());
    assert_eq!(
        tree.read("control"),
        "Source: blah\nTestsuite: autopkgtest\n\nPackage: libblah\nSection: extra\nArch: all\nDescription: foo\n bar\n\n"
    );
}

#[test]
fn test_relation_edit_roundtrip() {
    let tree = Tree::new(&[(
        "control",
        "Source: blah\nBuild-Depends: debhelper (>= 9),\n               python3\n",
    )]);
    let mut editor = ControlEditor::open(tree.control()).unwrap();
    let source = editor.source_mut().unwrap();
    let current = source.get("Build-Depends").unwrap().to_string();
    let updated = ensure_minimum_version(&current, "debhelper", "12").unwrap();
    source.set("Build-Depends", &updated).unwrap();
    editor.commit().unwrap();
    assert_eq!(
        tree.read("control"),
        "Source: blah\nBuild-Depends: debhelper (>= 12),\n               python3\n"
    );
}

// ===========================================================================
// Templates
// ===========================================================================

const TEMPLATE: &str = "\
Source: blah
Testsuite: autopkgtest
Uploaders: @lintian-brush-test@

";

#[test]
fn test_update_template() {
    let tree = Tree::new(&[
        (
            "control",
            "# DO NOT EDIT\n# This file was generated by blah\n\nSource: blah\nTestsuite: autopkgtest\nUploaders: Jelmer Vernooij <jelmer@jelmer.uk>\n\n",
        ),
        ("control.in", TEMPLATE),
    ]);
    let config = config_with(&[("lintian-brush-test", "testvalue")]);

    let mut editor = ControlEditor::open_with(tree.control(), &config).unwrap();
    assert!(editor.is_generated());
    assert!(editor.binding().is_some());
    editor
        .source_mut()
        .unwrap()
        .set("Testsuite", "autopkgtest8")
        .unwrap();
    assert_eq!(editor.changes().len(), 1);
    assert_eq!(
        editor.commit().unwrap(),
        CommitOutcome::TemplateUpdated {
            generated_written: true
        }
    );

    assert_eq!(
        tree.read("control.in"),
        "Source: blah\nTestsuite: autopkgtest8\nUploaders: @lintian-brush-test@\n\n"
    );
    assert_eq!(
        tree.read("control"),
        "Source: blah\nTestsuite: autopkgtest8\nUploaders: testvalue\n\n"
    );
}

#[test]
fn test_update_template_generated_write_failure_keeps_template() {
    let tree = Tree::new(&[
        (
            "control",
            "# DO NOT EDIT\n# This file was generated by blah\n\nSource: blah\nTestsuite: autopkgtest\nUploaders: Jelmer Vernooij <jelmer@jelmer.uk>\n\n",
        ),
        ("control.in", TEMPLATE),
    ]);
    let config = config_with(&[("lintian-brush-test", "testvalue")]);

    let mut editor = ControlEditor::open_with(tree.control(), &config).unwrap();
    editor
        .source_mut()
        .unwrap()
        .set("Testsuite", "autopkgtest8")
        .unwrap();

    // A non-empty directory in place of the control file cannot be
    // replaced by a rename.
    std::fs::remove_file(tree.control()).unwrap();
    std::fs::create_dir(tree.control()).unwrap();
    std::fs::write(tree.control().join("keep"), "").unwrap();

    let err = editor.commit().unwrap_err();
    assert!(matches!(err, EditError::Io { .. }), "{err}");
    assert_eq!(tree.read("control.in"), TEMPLATE);
    let leftovers: Vec<_> = std::fs::read_dir(&tree.debian)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 3, "{leftovers:?}");
}

#[test]
fn test_update_template_only() {
    let tree = Tree::new(&[("control.in", TEMPLATE)]);
    let config = config_with(&[("lintian-brush-test", "testvalue")]);

    let mut editor = ControlEditor::open_with(tree.control(), &config).unwrap();
    assert_eq!(
        editor.source().and_then(|s| s.get("Uploaders")),
        Some("testvalue")
    );
    editor
        .source_mut()
        .unwrap()
        .set("Testsuite", "autopkgtest8")
        .unwrap();
    assert_eq!(
        editor.commit().unwrap(),
        CommitOutcome::TemplateUpdated {
            generated_written: false
        }
    );

    assert_eq!(
        tree.read("control.in"),
        "Source: blah\nTestsuite: autopkgtest8\nUploaders: @lintian-brush-test@\n\n"
    );
    assert!(!tree.control().exists());
}

#[test]
fn test_update_cdbs_template() {
    let tree = Tree::new(&[
        (
            "control",
            "Source: blah\nTestsuite: autopkgtest\nBuild-Depends: some-foo, libc6\n\n",
        ),
        (
            "control.in",
            "Source: blah\nTestsuite: autopkgtest\nBuild-Depends: @cdbs@, libc6\n\n",
        ),
    ]);

    let mut editor = ControlEditor::open(tree.control()).unwrap();
    editor
        .source_mut()
        .unwrap()
        .set("Build-Depends", "some-foo, libc6, some-bar")
        .unwrap();
    editor.commit().unwrap();

    assert_eq!(
        tree.read("control"),
        "Source: blah\nTestsuite: autopkgtest\nBuild-Depends: some-foo, libc6, some-bar\n\n"
    );
    assert_eq!(
        tree.read("control.in"),
        "Source: blah\nTestsuite: autopkgtest\nBuild-Depends: @cdbs@, libc6, some-bar\n\n"
    );
}

#[test]
fn test_template_conflict_writes_nothing() {
    let generated = "Source: blah\nMaintainer: Joe <joe@example.com>\n";
    let template = "Source: blah\nMaintainer: @maintainer@ and others\n";
    let tree = Tree::new(&[("control", generated), ("control.in", template)]);
    let mut config = EditorConfig::default();
    config.merge.enabled = false;

    let mut editor = ControlEditor::open_with(tree.control(), &config).unwrap();
    editor
        .source_mut()
        .unwrap()
        .set("Maintainer", "Jane <jane@example.com>")
        .unwrap();
    let err = editor.commit().unwrap_err();
    assert!(matches!(err, EditError::FormattingUnpreservable { .. }));
    assert_eq!(tree.read("control"), generated);
    assert_eq!(tree.read("control.in"), template);
}

#[test]
fn test_template_unchanged_when_no_edit() {
    let tree = Tree::new(&[("control", "Source: blah\n"), ("control.in", "Source: blah\n")]);
    let editor = ControlEditor::open(tree.control()).unwrap();
    assert_eq!(editor.commit().unwrap(), CommitOutcome::Unchanged);
}

// ===========================================================================
// Series files
// ===========================================================================

#[test]
fn test_series_edit_keeps_comments() {
    let original = "# Upstream fixes\n01-upstream.patch\n\n# Debian specific\n02-paths.patch -p1\n";
    let tree = Tree::new(&[("patches/series", original)]);

    let mut editor = SeriesEditor::open(tree.path("patches/series")).unwrap();
    let patches: Vec<_> = editor.series().patches().collect();
    assert_eq!(patches, ["01-upstream.patch", "02-paths.patch"]);
    editor.remove("01-upstream.patch").unwrap();
    editor.append("03-docs.patch").unwrap();
    editor.commit().unwrap();

    assert_eq!(
        tree.read("patches/series"),
        "# Upstream fixes\n\n# Debian specific\n02-paths.patch -p1\n03-docs.patch\n"
    );
}
