//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the Clean Architecture
//! boundaries between domain, application, infra and commands hold.

use std::path::Path;

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Count non-test, non-comment, non-empty lines in a file.
fn count_non_test_lines(content: &str) -> usize {
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .filter(|line| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            !in_test && !trimmed.is_empty() && !trimmed.starts_with("//")
        })
        .count()
}


/// Path of `file` relative to the crate root, with forward slashes.
fn rel_path(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
        .replace('\\', "/")
}

fn src_dir(sub: &[&str]) -> std::path::PathBuf {
    let mut dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    for part in sub {
        dir = dir.join(part);
    }
    dir
}

/// Non-test lines of every file under `dir` containing any of `patterns`.
fn find_outside_tests(dir: &Path, patterns: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(dir) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let rel = rel_path(&file);
        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            if in_test || trimmed.starts_with("//") {
                continue;
            }
            for pattern in patterns {
                if line.contains(pattern) {
                    violations.push(format!("{rel}:{}: `{pattern}`: {trimmed}", i + 1));
                }
            }
        }
    }
    violations
}

// ── Output goes through the renderer ──────────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir(&["commands"])) {
        let lines = read_non_comment_lines(&file);
        let rel = rel_path(&file);

        for (i, line) in lines.iter().enumerate() {
            let lineno = i + 1;
            if line.contains("json: bool") {
                violations.push(format!(
                    "{rel}:{lineno}: found `json: bool` parameter: {line}"
                ));
            }
            let trimmed = line.trim();
            if trimmed.starts_with("if json")
                || trimmed.starts_with("if !json")
                || trimmed.contains("is_json()")
            {
                violations.push(format!("{rel}:{lineno}: found inline JSON branch: {line}"));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found inline JSON branching in commands/, use app.renderer() instead:\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_do_not_print_directly() {
    let violations = find_outside_tests(&src_dir(&["commands"]), &["println!", "eprintln!", "print!("]);
    assert!(
        violations.is_empty(),
        "commands/ must print through the renderer:\n{}",
        violations.join("\n")
    );
}

// ── Process execution stays in infra ──────────────────────────────────────────

#[test]
fn no_tokio_command_runner_new_outside_infra() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir(&[])) {
        let rel = rel_path(&file);
        if rel.contains("/infra/") {
            continue;
        }

        let lines = read_non_comment_lines(&file);
        for (i, line) in lines.iter().enumerate() {
            if line.contains("TokioCommandRunner::new") {
                violations.push(format!(
                    "{rel}:{}: TokioCommandRunner::new outside infra/: {line}",
                    i + 1
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found TokioCommandRunner::new outside infra/, host access goes through HostExecutor:\n{}",
        violations.join("\n")
    );
}

// ── Trait bounds over concrete types ──────────────────────────────────────────

#[test]
fn no_concrete_infra_types_in_service_signatures() {
    let concrete_types = [
        "HostBackend",
        "ReporterBackend",
        "JsonPortReservations",
        "JsonTrackedStore",
        "FileAgentLocks",
        "TokioCommandRunner",
    ];

    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir(&["application"])) {
        let rel = rel_path(&file);
        let lines = read_non_comment_lines(&file);
        for (i, line) in lines.iter().enumerate() {
            for concrete in &concrete_types {
                if line.contains(concrete) {
                    violations.push(format!(
                        "{rel}:{}: concrete type `{concrete}` in application/: {line}",
                        i + 1
                    ));
                }
            }
        }
    }

    assert!(
        violations.is_empty(),
        "application/ must depend on port traits, not infra types:\n{}",
        violations.join("\n")
    );
}

// ── Layer imports ─────────────────────────────────────────────────────────────

#[test]
fn domain_is_pure() {
    let violations = find_outside_tests(
        &src_dir(&["domain"]),
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net",
            "tracing::",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer-layer imports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_outer_layer_imports() {
    let violations = find_outside_tests(
        &src_dir(&["application"]),
        &["crate::infra", "crate::commands", "crate::output", "crate::app::"],
    );
    assert!(
        violations.is_empty(),
        "application/ must not import from infra/, commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_outside_tests(&src_dir(&["infra"]), &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find_outside_tests(&src_dir(&["infra"]), &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

// ── Command handlers accept the unified AppContext ────────────────────────────

#[test]
fn command_handlers_accept_app_context() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir(&["commands"])) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let uses_app = content.contains("app.renderer()")
            || content.contains("app.controller()")
            || content.contains("app.registry()");
        if !uses_app {
            continue;
        }
        if !content.contains("app: &AppContext") {
            violations.push(format!(
                "{}: uses AppContext but no handler accepts &AppContext",
                rel_path(&file)
            ));
        }
    }

    assert!(
        violations.is_empty(),
        "Command handlers that use AppContext must accept &AppContext:\n{}",
        violations.join("\n")
    );
}

/// Each file in `commands/` stays a thin adapter over application services.
#[test]
fn command_handlers_are_reasonably_sized() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir(&["commands"])) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };

        let line_count = count_non_test_lines(&content);
        if line_count > 125 {
            violations.push(format!(
                "{}: {line_count} non-test lines (limit: 125)",
                rel_path(&file)
            ));
        }
    }

    assert!(
        violations.is_empty(),
        "Command handler files exceed 125-line limit, extract logic to application services:\n{}",
        violations.join("\n")
    );
}

// ── Blocking I/O safety ───────────────────────────────────────────────────────

/// Track whether a line is inside an async fn and outside `spawn_blocking`.
struct AsyncContextTracker {
    in_async_fn: bool,
    in_spawn_blocking: bool,
    brace_depth: i32,
    async_fn_start_depth: i32,
    spawn_blocking_start_depth: i32,
}

impl AsyncContextTracker {
    fn new() -> Self {
        Self {
            in_async_fn: false,
            in_spawn_blocking: false,
            brace_depth: 0,
            async_fn_start_depth: 0,
            spawn_blocking_start_depth: 0,
        }
    }

    /// Process a line. Returns `true` if the line is in an async fn but NOT in `spawn_blocking`.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if (trimmed.contains("async fn ") || trimmed.contains("async fn\t"))
            && !trimmed.starts_with("//")
        {
            self.in_async_fn = true;
            self.async_fn_start_depth = self.brace_depth;
        } else if trimmed.contains("fn ")
            && !trimmed.contains("async ")
            && !trimmed.starts_with("//")
        {
            self.in_async_fn = false;
            self.in_spawn_blocking = false;
        }
        if self.in_async_fn && line.contains("spawn_blocking") {
            self.in_spawn_blocking = true;
            self.spawn_blocking_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_spawn_blocking && self.brace_depth <= self.spawn_blocking_start_depth
                    {
                        self.in_spawn_blocking = false;
                    }
                    if self.in_async_fn && self.brace_depth <= self.async_fn_start_depth {
                        self.in_async_fn = false;
                    }
                }
                _ => {}
            }
        }
        self.in_async_fn && !self.in_spawn_blocking
    }
}

fn blocking_fs_in_async(dir: &Path) -> Vec<String> {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(dir) {
        let rel = rel_path(&file);
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };

        let mut tracker = AsyncContextTracker::new();
        let mut tests = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tests.process_line(line);
            let in_unguarded_async = tracker.process_line(line);
            let trimmed = line.trim();
            if in_test || !in_unguarded_async || trimmed.starts_with("//") {
                continue;
            }
            for pattern in ["std::fs::", "std::process::Command", "std::net::"] {
                if line.contains(pattern) {
                    violations.push(format!("{rel}:{}: `{pattern}` in async fn: {trimmed}", i + 1));
                }
            }
        }
    }
    violations
}

#[test]
fn infra_async_functions_do_not_use_blocking_io() {
    let violations = blocking_fs_in_async(&src_dir(&["infra"]));
    assert!(
        violations.is_empty(),
        "infra/ async functions must not block outside spawn_blocking:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_blocking_io() {
    let violations = blocking_fs_in_async(&src_dir(&["application"]));
    assert!(
        violations.is_empty(),
        "Found blocking I/O calls in async functions in application/ layer:\n{}",
        violations.join("\n")
    );
}

/// No module-level #![`allow(dead_code)`] in domain/, application/, or infra/ layers.
#[test]
fn no_module_level_dead_code_allows_in_layers() {
    let mut violations: Vec<String> = Vec::new();

    for dir in [src_dir(&["domain"]), src_dir(&["application"]), src_dir(&["infra"])] {
        for file in collect_rs_files(&dir) {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            for (i, line) in content.lines().enumerate() {
                if line.trim() == "#![allow(dead_code)]" {
                    violations.push(format!(
                        "{}:{}: module-level #![allow(dead_code)], use item-level suppression",
                        rel_path(&file),
                        i + 1
                    ));
                }
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Module-level #![allow(dead_code)] found in architecture layers:\n{}",
        violations.join("\n")
    );
}
