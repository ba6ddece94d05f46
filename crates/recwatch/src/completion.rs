use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

/// Basename markers left behind by sync tools while a transfer is in flight
pub const DEFAULT_TEMP_MARKERS: &[&str] = &[".syncthing.", ".sttmp", ".stfolder"];

/// Tunables for deciding that a recording has stopped growing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionPolicy {
    /// Substrings that mark a basename as a temporary/partial file
    pub temp_markers: Vec<String>,
    /// Wait between two size samples, in milliseconds
    pub quiescence_ms: u64,
    /// Number of consecutive equal-size comparisons required
    pub stability_checks: u32,
    /// Require the size to stay put across the quiescence window(s)
    pub check_size_stable: bool,
    /// Require the file to open for shared reading
    pub check_open: bool,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            temp_markers: DEFAULT_TEMP_MARKERS.iter().map(|m| m.to_string()).collect(),
            quiescence_ms: 1000,
            stability_checks: 1,
            check_size_stable: true,
            check_open: true,
        }
    }
}

impl CompletionPolicy {
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }
}

/// Source of the quiescence wait
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock waits via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Filesystem probes used by the heuristic
pub trait FileProbe: Send + Sync {
    fn size(&self, path: &Path) -> io::Result<u64>;
    /// Open for reading without requesting exclusive access
    fn open_shared(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileProbe;

impl FileProbe for StdFileProbe {
    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn open_shared(&self, path: &Path) -> io::Result<()> {
        File::open(path).map(|_| ())
    }
}

/// Decides whether a path is a finished, non-temporary recording
pub struct CompletionDetector<C = TokioClock, P = StdFileProbe> {
    policy: CompletionPolicy,
    clock: C,
    probe: P,
}

impl CompletionDetector {
    pub fn new(policy: CompletionPolicy) -> Self {
        Self::with_parts(policy, TokioClock, StdFileProbe)
    }
}

impl<C: Clock, P: FileProbe> CompletionDetector<C, P> {
    pub fn with_parts(policy: CompletionPolicy, clock: C, probe: P) -> Self {
        Self { policy, clock, probe }
    }

    pub fn policy(&self) -> &CompletionPolicy {
        &self.policy
    }

    /// True if the basename contains any configured temp marker
    pub fn is_temporary(&self, path: &Path) -> bool {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };
        self.policy
            .temp_markers
            .iter()
            .any(|marker| !marker.is_empty() && name.contains(marker.as_str()))
    }

    /// Size-stability and open probe. Any I/O error means "not complete".
    ///
    /// A writer that pauses longer than the quiescence window is misreported
    /// as finished; widen the window or raise `stability_checks` for that.
    pub async fn is_complete(&self, path: &Path) -> bool {
        if self.policy.check_size_stable {
            let mut last = match self.probe.size(path) {
                Ok(size) => size,
                Err(e) => {
                    debug!("Cannot stat {}: {}", path.display(), e);
                    return false;
                }
            };

            for _ in 0..self.policy.stability_checks.max(1) {
                self.clock.sleep(self.policy.quiescence()).await;
                let next = match self.probe.size(path) {
                    Ok(size) => size,
                    Err(e) => {
                        debug!("Cannot re-stat {}: {}", path.display(), e);
                        return false;
                    }
                };
                if next != last {
                    debug!("{} still growing ({} -> {} bytes)", path.display(), last, next);
                    return false;
                }
                last = next;
            }
        }

        if self.policy.check_open {
            if let Err(e) = self.probe.open_shared(path) {
                debug!("{} not readable yet: {}", path.display(), e);
                return false;
            }
        }

        true
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeClock;
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of size samples
    struct ScriptedProbe {
        sizes: Mutex<VecDeque<u64>>,
        open_err: Option<io::ErrorKind>,
    }

    impl ScriptedProbe {
        fn new(sizes: Vec<u64>) -> Self {
            Self {
                sizes: Mutex::new(sizes.into_iter().collect()),
                open_err: None,
            }
        }

        fn locked(mut self) -> Self {
            self.open_err = Some(io::ErrorKind::PermissionDenied);
            self
        }
    }

    impl FileProbe for ScriptedProbe {
        fn size(&self, _path: &Path) -> io::Result<u64> {
            self.sizes
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn open_shared(&self, _path: &Path) -> io::Result<()> {
            match self.open_err {
                Some(kind) => Err(io::Error::from(kind)),
                None => Ok(()),
            }
        }
    }

    fn detector(sizes: Vec<u64>) -> CompletionDetector<FakeClock, ScriptedProbe> {
        CompletionDetector::with_parts(
            CompletionPolicy::default(),
            FakeClock::new(),
            ScriptedProbe::new(sizes),
        )
    }

    #[test]
    fn test_default_markers_flag_sync_temp_files() {
        let d = CompletionDetector::new(CompletionPolicy::default());
        assert!(d.is_temporary(Path::new("/rec/b.m2ts.sttmp")));
        assert!(d.is_temporary(Path::new("/rec/.syncthing.show.m2ts.tmp")));
        assert!(d.is_temporary(Path::new("/rec/.stfolder")));
        assert!(!d.is_temporary(Path::new("/rec/show.m2ts")));
        // Only the basename is inspected
        assert!(!d.is_temporary(Path::new("/rec/.stfolder-backup/show.m2ts")));
    }

    #[test]
    fn test_custom_markers_extend_the_list() {
        let mut policy = CompletionPolicy::default();
        policy.temp_markers.push(".part".to_string());
        let d = CompletionDetector::new(policy);
        assert!(d.is_temporary(Path::new("show.m2ts.part")));
    }

    #[tokio::test]
    async fn test_static_readable_file_is_complete() {
        let d = detector(vec![100, 100]);
        assert!(d.is_complete(Path::new("a.m2ts")).await);
        assert_eq!(*d.clock.sleeps.lock().unwrap(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn test_growing_file_is_not_complete() {
        let d = detector(vec![50, 80]);
        assert!(!d.is_complete(Path::new("b.m2ts")).await);
    }

    #[tokio::test]
    async fn test_stat_error_is_not_complete() {
        let d = detector(vec![100]);
        assert!(!d.is_complete(Path::new("gone.m2ts")).await);
    }

    #[tokio::test]
    async fn test_locked_file_is_not_complete() {
        let d = CompletionDetector::with_parts(
            CompletionPolicy::default(),
            FakeClock::new(),
            ScriptedProbe::new(vec![100, 100]).locked(),
        );
        assert!(!d.is_complete(Path::new("a.m2ts")).await);
    }

    #[tokio::test]
    async fn test_probes_can_be_disabled_independently() {
        let policy = CompletionPolicy {
            check_size_stable: false,
            ..CompletionPolicy::default()
        };
        let d = CompletionDetector::with_parts(policy, FakeClock::new(), ScriptedProbe::new(vec![]));
        assert!(d.is_complete(Path::new("a.m2ts")).await);
        assert!(d.clock.sleeps.lock().unwrap().is_empty());

        let policy = CompletionPolicy {
            check_open: false,
            ..CompletionPolicy::default()
        };
        let d = CompletionDetector::with_parts(
            policy,
            FakeClock::new(),
            ScriptedProbe::new(vec![7, 7]).locked(),
        );
        assert!(d.is_complete(Path::new("a.m2ts")).await);
    }

    #[tokio::test]
    async fn test_real_file_growing_during_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.m2ts");
        std::fs::write(&path, vec![0u8; 50]).unwrap();

        let grow = path.clone();
        let clock = FakeClock::with_hook(move || {
            std::fs::write(&grow, vec![0u8; 80]).unwrap();
        });
        let d = CompletionDetector::with_parts(CompletionPolicy::default(), clock, StdFileProbe);
        assert!(!d.is_complete(&path).await);

        let still = dir.path().join("a.m2ts");
        std::fs::write(&still, vec![0u8; 100]).unwrap();
        let d = CompletionDetector::with_parts(CompletionPolicy::default(), FakeClock::new(), StdFileProbe);
        assert!(d.is_complete(&still).await);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Complete iff every sample in the window matches the first
        #[test]
        fn test_complete_iff_all_samples_equal(
            checks in 1u32..5,
            first in 0u64..1_000_000,
            deltas in prop::collection::vec(prop_oneof![3 => Just(0i64), 1 => -10i64..10], 5),
        ) {
            let mut sizes = vec![first];
            for d in deltas.iter().take(checks as usize) {
                sizes.push((first as i64 + d).max(0) as u64);
            }
            let expected = sizes.iter().all(|s| *s == first);

            let policy = CompletionPolicy { stability_checks: checks, ..CompletionPolicy::default() };
            let d = CompletionDetector::with_parts(policy, FakeClock::new(), ScriptedProbe::new(sizes));
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let complete = rt.block_on(d.is_complete(Path::new("x.m2ts")));

            prop_assert_eq!(complete, expected);
        }

        /// Any basename carrying a marker is temporary
        #[test]
        fn test_marker_anywhere_in_name_is_temporary(
            prefix in "[a-zA-Z0-9_]{0,12}",
            suffix in "[a-zA-Z0-9_]{0,12}",
            marker in prop::sample::select(DEFAULT_TEMP_MARKERS.to_vec()),
        ) {
            let d = CompletionDetector::new(CompletionPolicy::default());
            let name = format!("{}{}{}", prefix, marker, suffix);
            prop_assert!(d.is_temporary(Path::new(&name)));
        }
    }
}
