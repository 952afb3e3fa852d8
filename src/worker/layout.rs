//! Path layout of the workload scripts
//!
//! Every worker works under its own namespace directory `/<base>.<worker_id>`.
//! The builders here are the single source of the paths a script touches, so
//! the validator can measure the longest one before any worker starts.

use crate::config::workload::WorkloadScript;
use crate::config::WorkloadConfig;

/// Namespace directory of one worker
pub fn namespace(base: &str, worker_id: usize) -> String {
    format!("/{}.{}", base, worker_id)
}

/// Nested directory chain of file `i`, ending in '/'
///
/// `depth - 2` levels named `dir{i}` below the namespace; with depth 2 the
/// file sits directly in the namespace.
pub fn nested_dir(ns: &str, i: u64, depth: usize) -> String {
    let component = format!("dir{}/", i);
    let levels = depth.saturating_sub(2);
    let mut path = String::with_capacity(ns.len() + 1 + levels * component.len());
    path.push_str(ns);
    path.push('/');
    for _ in 0..levels {
        path.push_str(&component);
    }
    path
}

/// File `i` inside its nested directory chain
pub fn nested_file(ns: &str, i: u64, depth: usize) -> String {
    let mut path = nested_dir(ns, i, depth);
    path.push_str(&format!("file{}", i));
    path
}

/// Sibling directory `i` of the private_mkdir script
pub fn private_dir(ns: &str, i: u64) -> String {
    format!("{}/dir-{}", ns, i)
}

/// Leaf directory of a skewed_stat key: `<ns>/f<key>/a1/.../a<depth>`
pub fn key_path(ns: &str, key: u64, depth: usize) -> String {
    let mut path = format!("{}/f{:06}", ns, key);
    for level in 1..=depth {
        path.push_str(&format!("/a{}", level));
    }
    path
}

/// Length of the longest path `workload` builds with `threads` workers
pub fn longest_path_len(workload: &WorkloadConfig, threads: usize) -> usize {
    let ns = namespace(&workload.base_name, threads.saturating_sub(1));
    let last = workload.count.saturating_sub(1);
    match workload.script {
        WorkloadScript::NestedCreateStat | WorkloadScript::Lifecycle => {
            nested_file(&ns, last, workload.depth).len()
        }
        WorkloadScript::PrivateMkdir => private_dir(&ns, last).len(),
        WorkloadScript::SkewedStat => key_path(&ns, workload.universe.max(1), workload.depth).len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace() {
        assert_eq!(namespace("mdpulse", 3), "/mdpulse.3");
    }

    #[test]
    fn test_nested_paths() {
        assert_eq!(nested_dir("/b.0", 7, 4), "/b.0/dir7/dir7/");
        assert_eq!(nested_file("/b.0", 7, 4), "/b.0/dir7/dir7/file7");
        assert_eq!(nested_file("/b.0", 7, 2), "/b.0/file7");
    }

    #[test]
    fn test_key_path() {
        assert_eq!(key_path("/b.1", 42, 3), "/b.1/f000042/a1/a2/a3");
        assert_eq!(key_path("/b.1", 1234567, 1), "/b.1/f1234567/a1");
    }

    #[test]
    fn test_longest_path_uses_last_worker_and_index() {
        let workload = WorkloadConfig {
            count: 100,
            depth: 3,
            base_name: "x".to_string(),
            ..Default::default()
        };
        // "/x.11/dir99/file99"
        assert_eq!(longest_path_len(&workload, 12), "/x.11/dir99/file99".len());

        let skewed = WorkloadConfig {
            script: WorkloadScript::SkewedStat,
            universe: 10,
            depth: 2,
            base_name: "x".to_string(),
            ..Default::default()
        };
        assert_eq!(longest_path_len(&skewed, 1), "/x.0/f000010/a1/a2".len());
    }
}
