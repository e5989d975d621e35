//! Fake external tools for tests.
//!
//! The service treats the language compiler and the secondary toolchain as
//! opaque executables, so tests stand them in with small shell scripts that
//! exercise specific contract corners: write some artifacts, exit non-zero,
//! sleep past a timeout, echo input back. Unix-only, like the PTY tests.

use std::path::{Path, PathBuf};

/// Write an executable shell script at `path` with the given body.
pub fn write_executable(path: impl AsRef<Path>, body: &str) -> PathBuf {
    let path = path.as_ref();
    let script = format!("#!/bin/sh\n{body}\n");
    std::fs::write(path, script).expect("writing fake tool script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .expect("reading fake tool metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).expect("marking fake tool executable");
    }

    path.to_path_buf()
}

/// A compiler double invoked as `<compiler> <input> <outdir>`.
///
/// `artifacts` maps artifact file names to contents; everything listed is
/// written into the output directory, then the script exits with
/// `exit_code`. Non-empty contents gain a trailing newline (heredoc); empty
/// contents produce an empty file.
pub fn fake_compiler(
    dir: impl AsRef<Path>,
    artifacts: &[(&str, &str)],
    exit_code: i32,
) -> PathBuf {
    let mut body = String::new();
    for (name, contents) in artifacts {
        if contents.is_empty() {
            body.push_str(&format!(": > \"$2/{name}\"\n"));
        } else {
            body.push_str(&format!("cat > \"$2/{name}\" <<'EOF'\n{contents}\nEOF\n"));
        }
    }
    body.push_str(&format!("exit {exit_code}"));
    write_executable(dir.as_ref().join("compiler.sh"), &body)
}

/// A compiler double that copies its input file into `output.txt`, proving
/// which scratch area it ran against.
pub fn echo_compiler(dir: impl AsRef<Path>) -> PathBuf {
    write_executable(
        dir.as_ref().join("compiler.sh"),
        "cat \"$1\" > \"$2/output.txt\"\nexit 0",
    )
}

/// A compiler double that sleeps longer than any test timeout.
pub fn sleeping_compiler(dir: impl AsRef<Path>) -> PathBuf {
    write_executable(dir.as_ref().join("compiler.sh"), "sleep 30\nexit 0")
}

/// A toolchain double invoked as `<toolchain> <source> -o <binary>` that
/// writes `program_body` as the runnable "binary" and exits 0.
pub fn fake_toolchain_ok(dir: impl AsRef<Path>, program_body: &str) -> PathBuf {
    let body = format!(
        "cat > \"$3\" <<'EOF'\n#!/bin/sh\n{program_body}\nEOF\nchmod +x \"$3\"\nexit 0"
    );
    write_executable(dir.as_ref().join("toolchain.sh"), &body)
}

/// A toolchain double that prints a diagnostic and exits with `exit_code`
/// without producing a binary.
pub fn fake_toolchain_failing(dir: impl AsRef<Path>, exit_code: i32) -> PathBuf {
    let body = format!("echo 'toolchain: build failed' 1>&2\nexit {exit_code}");
    write_executable(dir.as_ref().join("toolchain.sh"), &body)
}

/// A toolchain double that sleeps, for busy-rejection tests.
pub fn fake_toolchain_slow(dir: impl AsRef<Path>) -> PathBuf {
    write_executable(dir.as_ref().join("toolchain.sh"), "sleep 30\nexit 0")
}
