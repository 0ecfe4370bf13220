/// Platform helpers — detection of the running clinical console.
///
/// The action safety gate: archiving must not run while the console still
/// has the imaging store open. This is a caller-side precondition — the
/// executor itself never calls in here.

/// Whether a process with the given image name is currently running.
///
/// Windows asks `tasklist`; Linux scans `/proc/<pid>/comm`. On other
/// platforms (and on any probe failure) the answer is `false` — the
/// operator is expected to check manually where detection is unsupported.
pub fn is_process_running(name: &str) -> bool {
    #[cfg(windows)]
    {
        is_process_running_windows(name)
    }
    #[cfg(target_os = "linux")]
    {
        is_process_running_linux(name)
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        let _ = name;
        false
    }
}

#[cfg(windows)]
fn is_process_running_windows(name: &str) -> bool {
    std::process::Command::new("tasklist")
        .output()
        .map(|output| {
            String::from_utf8_lossy(&output.stdout)
                .to_ascii_lowercase()
                .contains(&name.to_ascii_lowercase())
        })
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
fn is_process_running_linux(name: &str) -> bool {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return false;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let pid = file_name.to_string_lossy();
        if !pid.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if comm_matches(&entry.path(), name) {
            return true;
        }
    }
    false
}

/// Compare a `/proc/<pid>/comm` value against the configured image name.
/// The kernel truncates comm to 15 bytes, so a longer configured name is
/// matched on its truncated prefix as well.
#[cfg(target_os = "linux")]
fn comm_matches(proc_dir: &std::path::Path, name: &str) -> bool {
    let Ok(comm) = std::fs::read_to_string(proc_dir.join("comm")) else {
        return false;
    };
    let comm = comm.trim();
    comm.eq_ignore_ascii_case(name)
        || name
            .get(..15)
            .is_some_and(|prefix| comm.eq_ignore_ascii_case(prefix))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn finds_the_current_process_by_its_comm() {
        let own_comm = std::fs::read_to_string("/proc/self/comm").unwrap();
        assert!(is_process_running(own_comm.trim()));
    }

    #[test]
    fn absent_process_is_not_running() {
        assert!(!is_process_running("no-such-console-process.exe"));
    }
}
