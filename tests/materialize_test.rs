//! End-to-end tests for the materialize-base CLI over fixture vaults.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Build a vault directory (with its .obsidian marker) from
/// (relative path, content) pairs and return the temp handle.
fn make_vault(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    fs::create_dir_all(dir.path().join(".obsidian")).expect("create .obsidian");
    for (relative, content) in files {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write fixture file");
    }
    dir
}

/// Run the binary against a base file inside the vault.
fn run(vault: &Path, base_relative: &str, extra_args: &[&str]) -> (String, String, i32) {
    let binary = env!("CARGO_BIN_EXE_materialize-base");
    let output = Command::new(binary)
        .arg(vault.join(base_relative))
        .arg("--vault")
        .arg(vault)
        .args(extra_args)
        .output()
        .expect("failed to execute materialize-base");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

mod tagged_notes_view {
    use super::*;

    const BASE: &str = r#"filters: file.hasTag("project")
formulas:
  shouting: note.title.toUpperCase()
views:
  - type: table
    name: Tagged notes
    order:
      - note.title
      - file.name
      - formula.shouting
"#;

    #[test]
    fn formula_column_row() {
        let vault = make_vault(&[
            ("projects.base", BASE),
            (
                "project-alpha.md",
                "---\ntitle: Project Alpha Launch\ntags:\n  - project\n---\nBody.\n",
            ),
            ("unrelated.md", "---\ntitle: Not tagged\n---\n"),
        ]);

        let (stdout, stderr, code) = run(vault.path(), "projects.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(stdout.starts_with("# Tagged notes\n\n"));
        assert!(stdout.contains("| Project Alpha Launch | project-alpha | PROJECT ALPHA LAUNCH |"));
        // The untagged file is filtered out.
        assert!(!stdout.contains("Not tagged"));
    }

    #[test]
    fn explicit_view_flag() {
        let vault = make_vault(&[
            ("projects.base", BASE),
            (
                "p.md",
                "---\ntitle: P\ntags: [project]\n---\n",
            ),
        ]);
        let (stdout, _, code) = run(vault.path(), "projects.base", &["--view=Tagged notes"]);
        assert_eq!(code, 0);
        assert!(stdout.contains("| P | p | P |"));
    }

    #[test]
    fn unknown_view_errors() {
        let vault = make_vault(&[("projects.base", BASE)]);
        let (stdout, stderr, code) = run(vault.path(), "projects.base", &["--view=Nope"]);
        assert_eq!(code, 1);
        assert!(stdout.is_empty());
        assert!(stderr.contains("View \"Nope\" not found"));
    }
}

mod archived_view_limit {
    use super::*;

    #[test]
    fn limit_one_of_three_matches() {
        let base = r#"views:
  - type: table
    name: Archived
    limit: 1
    filters: note.status == "archived"
    order:
      - file.name
"#;
        let vault = make_vault(&[
            ("archived.base", base),
            ("one.md", "---\nstatus: archived\n---\n"),
            ("two.md", "---\nstatus: archived\n---\n"),
            ("three.md", "---\nstatus: archived\n---\n"),
        ]);

        let (stdout, stderr, code) = run(vault.path(), "archived.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        let body_rows: Vec<&str> = stdout
            .lines()
            .filter(|line| line.starts_with('|') && !line.contains("---"))
            .collect();
        // Header plus exactly one body row.
        assert_eq!(body_rows.len(), 2, "output: {}", stdout);
    }
}

mod date_arithmetic {
    use super::*;

    #[test]
    fn date_minus_week_formats_iso() {
        let base = r#"formulas:
  lastweek: date("2024-01-08T00:00:00Z") - "1 week"
views:
  - type: table
    name: Dates
    order:
      - formula.lastweek
"#;
        let vault = make_vault(&[("dates.base", base), ("note.md", "x\n")]);
        let (stdout, stderr, code) = run(vault.path(), "dates.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(
            stdout.contains("| 2024-01-01T00:00:00.000Z |"),
            "output: {}",
            stdout
        );
    }
}

mod circular_formulas {
    use super::*;

    #[test]
    fn cycle_is_reported() {
        let base = r#"formulas:
  a: formula.b + 1
  b: formula.a + 1
views:
  - type: table
    name: Cycle
    order:
      - formula.a
"#;
        let vault = make_vault(&[("cycle.base", base), ("note.md", "x\n")]);
        let (stdout, stderr, code) = run(vault.path(), "cycle.base", &[]);
        assert_eq!(code, 1);
        assert!(stdout.is_empty());
        assert!(
            stderr.contains("Circular formula reference detected for \"a\"")
                || stderr.contains("Circular formula reference detected for \"b\""),
            "stderr: {}",
            stderr
        );
    }
}

mod empty_view {
    use super::*;

    #[test]
    fn placeholder_table() {
        let base = "views:\n  - type: table\n    name: Empty\n";
        let vault = make_vault(&[("empty.base", base), ("note.md", "x\n")]);
        let (stdout, stderr, code) = run(vault.path(), "empty.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert_eq!(stdout, "# Empty\n\n|  |\n| --- |\n");
    }
}

mod regex_matching {
    use super::*;

    #[test]
    fn regex_formula_distinguishes_titles() {
        let base = r#"formulas:
  isalpha: /alpha/i.matches(note.title)
views:
  - type: table
    name: Regex
    order:
      - note.title
      - formula.isalpha
"#;
        let vault = make_vault(&[
            ("regex.base", base),
            ("a.md", "---\ntitle: Project Alpha Launch\n---\n"),
            ("b.md", "---\ntitle: Project Beta Support\n---\n"),
        ]);
        let (stdout, stderr, code) = run(vault.path(), "regex.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(stdout.contains("| Project Alpha Launch | true |"));
        assert!(stdout.contains("| Project Beta Support | false |"));
    }
}

mod filter_trees {
    use super::*;

    #[test]
    fn compound_and_or_not() {
        let base = r#"filters:
  and:
    - note.status == "open"
    - or:
        - file.hasTag("project")
        - file.hasTag("log")
  not:
    - file.inFolder("archive")
views:
  - type: table
    name: Open things
    order:
      - file.name
"#;
        let vault = make_vault(&[
            ("open.base", base),
            ("keep.md", "---\nstatus: open\ntags: [project]\n---\n"),
            ("wrong-status.md", "---\nstatus: done\ntags: [project]\n---\n"),
            ("no-tag.md", "---\nstatus: open\n---\n"),
            ("archive/hidden.md", "---\nstatus: open\ntags: [log]\n---\n"),
        ]);
        let (stdout, stderr, code) = run(vault.path(), "open.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(stdout.contains("| keep |"));
        assert!(!stdout.contains("wrong-status"));
        assert!(!stdout.contains("no-tag"));
        assert!(!stdout.contains("hidden"));
    }

    #[test]
    fn group_must_be_array_message() {
        let base = "filters:\n  and:\n    oops: true\nviews:\n  - type: table\n    name: V\n";
        let vault = make_vault(&[("bad.base", base)]);
        let (stdout, stderr, code) = run(vault.path(), "bad.base", &[]);
        assert_eq!(code, 1);
        assert!(stdout.is_empty());
        assert!(
            stderr.contains("\"and\" group must be an array"),
            "stderr: {}",
            stderr
        );
    }
}

mod cell_escaping {
    use super::*;

    #[test]
    fn pipes_and_newlines_escaped() {
        let base = r#"views:
  - type: table
    name: Escapes
    order:
      - note.snippet
"#;
        let vault = make_vault(&[
            ("escapes.base", base),
            ("note.md", "---\nsnippet: \"a|b\\nsecond line\"\n---\n"),
        ]);
        let (stdout, stderr, code) = run(vault.path(), "escapes.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(stdout.contains("| a\\|b<br>second line |"), "output: {}", stdout);
    }
}

mod vault_discovery {
    use super::*;

    #[test]
    fn vault_inferred_from_obsidian_marker() {
        let base = "views:\n  - type: table\n    name: V\n    order:\n      - file.name\n";
        let vault = make_vault(&[("sub/notes.base", base), ("sub/note.md", "x\n")]);

        // No --vault: the .obsidian ancestor of the base path wins.
        let binary = env!("CARGO_BIN_EXE_materialize-base");
        let output = Command::new(binary)
            .arg(vault.path().join("sub/notes.base"))
            .output()
            .expect("failed to execute materialize-base");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(output.status.code(), Some(0));
        assert!(stdout.contains("| note |"), "output: {}", stdout);
    }

    #[test]
    fn missing_marker_suggests_vault_flag() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("x.base");
        fs::write(&base_path, "views: []\n").unwrap();

        let binary = env!("CARGO_BIN_EXE_materialize-base");
        let output = Command::new(binary)
            .arg(&base_path)
            .output()
            .expect("failed to execute materialize-base");
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("--vault"), "stderr: {}", stderr);
    }
}

mod error_reporting {
    use super::*;

    #[test]
    fn column_error_chain_on_stderr() {
        let base = r#"views:
  - type: table
    name: V
    order:
      - no_such_binding
"#;
        let vault = make_vault(&[("bad.base", base), ("note.md", "x\n")]);
        let (stdout, stderr, code) = run(vault.path(), "bad.base", &[]);
        assert_eq!(code, 1);
        assert!(stdout.is_empty());
        assert!(stderr.contains("property \"no_such_binding\" for file \"note.md\""));
        // Blank line separates the wrapping layer from the cause.
        assert!(stderr.contains("\n\n"), "stderr: {}", stderr);
        assert!(stderr.contains("ReferenceError"));
    }

    #[test]
    fn unreadable_base_file() {
        let vault = make_vault(&[("note.md", "x\n")]);
        let (stdout, stderr, code) = run(vault.path(), "missing.base", &[]);
        assert_eq!(code, 1);
        assert!(stdout.is_empty());
        assert!(!stderr.is_empty());
    }

    #[test]
    fn non_mapping_base_rejected() {
        let vault = make_vault(&[("list.base", "- a\n- b\n"), ("note.md", "x\n")]);
        let (_, stderr, code) = run(vault.path(), "list.base", &[]);
        assert_eq!(code, 1);
        assert!(stderr.contains("must be a mapping"), "stderr: {}", stderr);
    }
}

mod scope_surface {
    use super::*;

    #[test]
    fn promoted_identifiers_and_aliases() {
        // The filter guards on note.status so files without the key
        // are dropped before the bare promoted identifier is used.
        let base = r#"filters: note.status == "open"
views:
  - type: table
    name: V
    order:
      - status
      - frontmatter.status
      - properties.status
"#;
        let vault = make_vault(&[
            ("promoted.base", base),
            ("open.md", "---\nstatus: open\n---\n"),
            ("closed.md", "---\nstatus: closed\n---\n"),
        ]);
        let (stdout, stderr, code) = run(vault.path(), "promoted.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(stdout.contains("| open | open | open |"));
        assert!(!stdout.contains("closed"));
    }

    #[test]
    fn backlinks_and_links_surface() {
        let base = r#"views:
  - type: table
    name: V
    order:
      - file.name
      - file.backlinks.length
      - file.links.length
"#;
        let vault = make_vault(&[
            ("links.base", base),
            ("hub.md", "[[spoke]]\n"),
            ("spoke.md", "quiet\n"),
        ]);
        let (stdout, stderr, code) = run(vault.path(), "links.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(stdout.contains("| hub | 0 | 1 |"), "output: {}", stdout);
        assert!(stdout.contains("| spoke | 1 | 0 |"), "output: {}", stdout);
    }

    #[test]
    fn properties_drive_columns_without_order() {
        let base = r#"properties:
  note.title:
    displayName: Title
  file.ext: {}
views:
  - type: table
    name: V
"#;
        let vault = make_vault(&[
            ("props.base", base),
            ("doc.md", "---\ntitle: Hello\n---\n"),
        ]);
        let (stdout, stderr, code) = run(vault.path(), "props.base", &[]);
        assert_eq!(code, 0, "stderr: {}", stderr);
        assert!(stdout.contains("| Title | file.ext |"));
        assert!(stdout.contains("| Hello | md |"));
    }
}
