//! Tests for repository containment and mutation semantics of the tool registry
//!
//! Every call goes through `ToolRegistry::execute`, the same entry point the
//! agent loop uses, so errors are checked as the model would see them.

use proptest::prelude::*;
use repo_agent::config::ToolsConfig;
use repo_agent::tools::{RepoSandbox, ToolOutput, ToolRegistry};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, ToolRegistry) {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("repo/src")).unwrap();
    fs::write(tmp.path().join("repo/src/lib.rs"), "pub fn a() {}\n").unwrap();
    fs::write(tmp.path().join("secret.txt"), "top secret").unwrap();

    let sandbox = RepoSandbox::new(tmp.path().join("repo")).unwrap();
    let registry = ToolRegistry::with_defaults(sandbox, &ToolsConfig::default());
    (tmp, registry)
}

fn run(registry: &ToolRegistry, tool: &str, input: Value) -> ToolOutput {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(registry.execute(tool, input))
}

fn assert_blocked(output: &ToolOutput) {
    assert!(output.is_error(), "expected an error, got {:?}", output);
    assert!(
        output.text().contains("Path traversal blocked"),
        "expected a traversal error, got {:?}",
        output
    );
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_every_path_tool_rejects_traversal() {
    let (tmp, registry) = setup();
    let escape = "../secret.txt";

    let calls = [
        ("read_file", json!({"path": escape})),
        ("read_file_lines", json!({"path": escape, "start_line": 1, "end_line": 1})),
        ("write_file", json!({"path": escape, "content": "pwned"})),
        ("create_file", json!({"path": "../created.txt", "content": "pwned"})),
        ("patch_file", json!({"path": escape, "old_text": "top", "new_text": "no"})),
        ("delete_file", json!({"path": escape})),
        ("rename_file", json!({"old_path": escape, "new_path": "stolen.txt"})),
        ("rename_file", json!({"old_path": "src/lib.rs", "new_path": "../moved.rs"})),
        ("list_directory", json!({"path": ".."})),
        ("list_directory_tree", json!({"path": ".."})),
        ("search_in_files", json!({"pattern": "secret", "path": ".."})),
    ];

    for (tool, input) in calls {
        assert_blocked(&run(&registry, tool, input));
    }

    // Nothing outside the root changed
    assert_eq!(
        fs::read_to_string(tmp.path().join("secret.txt")).unwrap(),
        "top secret"
    );
    assert!(!tmp.path().join("created.txt").exists());
    assert!(!tmp.path().join("moved.rs").exists());
    assert!(tmp.path().join("repo/src/lib.rs").exists());
}

#[test]
fn test_absolute_paths_are_rejected() {
    let (tmp, registry) = setup();
    let absolute = tmp.path().join("secret.txt");

    let output = run(
        &registry,
        "read_file",
        json!({"path": absolute.to_string_lossy()}),
    );
    assert_blocked(&output);
}

#[cfg(unix)]
#[test]
fn test_symlink_escape_is_rejected_for_writes() {
    let (tmp, registry) = setup();
    std::os::unix::fs::symlink(tmp.path(), tmp.path().join("repo/outside")).unwrap();

    let output = run(
        &registry,
        "create_file",
        json!({"path": "outside/planted.txt", "content": "x"}),
    );
    assert_blocked(&output);
    assert!(!tmp.path().join("planted.txt").exists());
}

/// Repository with a link to the directory above it and a dangling link whose
/// target would be created outside
#[cfg(unix)]
fn setup_with_links() -> (TempDir, ToolRegistry) {
    let (tmp, registry) = setup();
    std::os::unix::fs::symlink(tmp.path(), tmp.path().join("repo/link")).unwrap();
    std::os::unix::fs::symlink(
        tmp.path().join("planted.txt"),
        tmp.path().join("repo/dangle"),
    )
    .unwrap();
    (tmp, registry)
}

#[cfg(unix)]
#[test]
fn test_missing_component_before_parent_does_not_bypass_links() {
    let (tmp, registry) = setup_with_links();

    let calls = [
        ("read_file", json!({"path": "ghost/../link/secret.txt"})),
        ("create_file", json!({"path": "ghost/../link/pwned.txt", "content": "x"})),
        ("write_file", json!({"path": "ghost/../link/secret.txt", "content": "x"})),
        ("delete_file", json!({"path": "ghost/../link/secret.txt"})),
        ("rename_file", json!({"old_path": "ghost/../link/secret.txt", "new_path": "s.txt"})),
        ("rename_file", json!({"old_path": "src/lib.rs", "new_path": "ghost/../link/lib.rs"})),
    ];
    for (tool, input) in calls {
        assert_blocked(&run(&registry, tool, input));
    }

    assert_eq!(
        fs::read_to_string(tmp.path().join("secret.txt")).unwrap(),
        "top secret"
    );
    assert!(!tmp.path().join("pwned.txt").exists());
    assert!(!tmp.path().join("lib.rs").exists());
}

#[cfg(unix)]
#[test]
fn test_dangling_link_is_not_written_through() {
    let (tmp, registry) = setup_with_links();

    for (tool, input) in [
        ("create_file", json!({"path": "dangle", "content": "x"})),
        ("write_file", json!({"path": "dangle", "content": "x"})),
        ("rename_file", json!({"old_path": "src/lib.rs", "new_path": "dangle"})),
    ] {
        assert_blocked(&run(&registry, tool, input));
    }
    assert!(!tmp.path().join("planted.txt").exists());
    assert!(tmp.path().join("repo/src/lib.rs").exists());
}

#[cfg(unix)]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_detours_through_missing_dirs_never_reach_links(
        detour in prop::collection::vec(
            prop_oneof![
                Just("ghost".to_string()),
                Just("src".to_string()),
                Just("link".to_string()),
                "[a-z]{1,6}",
            ],
            0..4,
        ),
        target in prop_oneof![
            Just("link/secret.txt"),
            Just("link/new.txt"),
            Just("dangle"),
            Just("link"),
        ],
    ) {
        let (tmp, registry) = setup_with_links();
        let mut parts = detour.clone();
        parts.extend(std::iter::repeat("..".to_string()).take(detour.len()));
        parts.push(target.to_string());
        let path = parts.join("/");

        let output = run(&registry, "create_file", json!({"path": path, "content": "x"}));
        prop_assert!(output.is_error());
        prop_assert!(output.text().contains("Path traversal blocked"));
        prop_assert!(!tmp.path().join("new.txt").exists());
        prop_assert!(!tmp.path().join("planted.txt").exists());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_climbing_above_root_is_always_blocked(
        segments in prop::collection::vec("[a-z]{1,6}", 0..4),
        extra in 1usize..3,
    ) {
        let (_tmp, registry) = setup();
        let mut path = segments.join("/");
        for _ in 0..segments.len() + extra {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str("..");
        }
        path.push_str("/secret.txt");

        let output = run(&registry, "read_file", json!({"path": path}));
        prop_assert!(output.is_error());
        prop_assert!(output.text().contains("Path traversal blocked"));
    }
}

// ============================================================================
// Mutation semantics
// ============================================================================

#[test]
fn test_ambiguous_patch_leaves_file_untouched() {
    let (tmp, registry) = setup();
    let file = tmp.path().join("repo/dup.txt");
    let original = b"x = 1\ny = 2\nx = 1\n\xff\n".to_vec();
    fs::write(&file, &original).unwrap();

    let output = run(
        &registry,
        "patch_file",
        json!({"path": "dup.txt", "old_text": "x = 1", "new_text": "x = 3"}),
    );

    assert!(output.is_error());
    assert!(output.text().contains("2 times"));
    assert_eq!(fs::read(&file).unwrap(), original);
}

#[test]
fn test_create_then_write_last_write_wins() {
    let (tmp, registry) = setup();

    let output = run(
        &registry,
        "write_file",
        json!({"path": "notes.md", "content": "first"}),
    );
    assert!(output.is_error());
    assert!(output.text().contains("Use create_file"));

    let output = run(
        &registry,
        "create_file",
        json!({"path": "notes.md", "content": "first"}),
    );
    assert_eq!(output, ToolOutput::Success("Successfully created notes.md".into()));

    let output = run(
        &registry,
        "create_file",
        json!({"path": "notes.md", "content": "again"}),
    );
    assert!(output.is_error());

    let output = run(
        &registry,
        "write_file",
        json!({"path": "notes.md", "content": "second"}),
    );
    assert_eq!(output, ToolOutput::Success("Successfully wrote to notes.md".into()));

    assert_eq!(
        fs::read_to_string(tmp.path().join("repo/notes.md")).unwrap(),
        "second"
    );
}

#[test]
fn test_read_file_lines_range_errors_and_clamping() {
    let (tmp, registry) = setup();
    fs::write(tmp.path().join("repo/three.txt"), "one\ntwo\nthree\n").unwrap();

    let output = run(
        &registry,
        "read_file_lines",
        json!({"path": "three.txt", "start_line": 5, "end_line": 3}),
    );
    assert!(output.is_error());
    assert!(output.text().contains("Invalid line range"));

    let output = run(
        &registry,
        "read_file_lines",
        json!({"path": "three.txt", "start_line": 2, "end_line": 99}),
    );
    assert_eq!(output, ToolOutput::Success("2: two\n3: three".into()));
}

#[cfg(unix)]
#[test]
fn test_force_push_blocked_and_output_truncated() {
    let tmp = TempDir::new().unwrap();
    let sandbox = RepoSandbox::new(tmp.path()).unwrap();
    let config = ToolsConfig {
        max_command_output_chars: 50,
        ..Default::default()
    };
    let registry = ToolRegistry::with_defaults(sandbox, &config);

    let output = run(
        &registry,
        "run_command",
        json!({"command": "touch ran.txt; git push --force origin main"}),
    );
    assert!(output.is_error());
    assert!(output.text().contains("git push --force"));
    assert!(!tmp.path().join("ran.txt").exists());

    let output = run(
        &registry,
        "run_command",
        json!({"command": "seq 1 500; exit 4"}),
    );
    assert!(!output.is_error());
    assert!(output
        .text()
        .contains("\n... (output truncated at 50 characters)"));
    assert!(output.text().ends_with("\nExit code: 4"));
}
