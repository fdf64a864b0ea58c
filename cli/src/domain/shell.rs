//! POSIX shell quoting for commands sent to the host.

/// Quote `s` as a single shell word.
///
/// Words made only of safe characters are returned as-is so logged commands
/// stay readable; everything else is single-quoted.
#[must_use]
pub fn quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Parent directory of an absolute host path, if it has one.
#[must_use]
pub fn parent_dir(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Command that writes stdin to `path`, creating its parent directory.
#[must_use]
pub fn write_stdin_to(path: &str) -> String {
    match parent_dir(path) {
        Some(dir) if dir != "/" => format!("mkdir -p {} && cat > {}", quote(dir), quote(path)),
        _ => format!("cat > {}", quote(path)),
    }
}
