//! Bridge between the host and a core's private filesystem
//!
//! Cores write their results (states, battery saves, screenshots) whenever
//! their own loop gets around to it and never say when they are done. The
//! bridge therefore detects completion by polling: a file is ready once two
//! size readings taken one interval apart agree and are non-zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use retrolaunch_shared::ini::{self, ConfigMap};
use retrolaunch_shared::layout;
use serde::{Deserialize, Serialize};

use super::{CoreFileSystem, mkdir_tree};
use crate::error::{Error, Result};
use crate::input::ResolvableInput;
use crate::module::CoreModule;

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Polling timings for runtime readiness and output stabilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Fixed wait between runtime readiness checks
    #[serde(with = "millis")]
    pub ready_interval: Duration,
    /// Give up on runtime readiness after this long
    #[serde(with = "millis")]
    pub ready_timeout: Duration,
    /// First wait before sampling an output file
    #[serde(with = "millis")]
    pub initial_interval: Duration,
    /// Upper bound for a single wait while the interval doubles
    #[serde(with = "millis")]
    pub max_interval: Duration,
    /// Maximum number of size samples before timing out
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            ready_interval: Duration::from_millis(10),
            ready_timeout: Duration::from_secs(30),
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            max_retries: 30,
        }
    }
}

impl PollConfig {
    /// Wait before the sample with index `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Mediates every interaction with a core's filesystem primitive.
pub struct VirtualFileSystemBridge {
    core: Arc<dyn CoreModule>,
    poll: PollConfig,
}

impl VirtualFileSystemBridge {
    pub fn new(core: Arc<dyn CoreModule>, poll: PollConfig) -> Self {
        Self { core, poll }
    }

    fn fs(&self) -> Arc<dyn CoreFileSystem> {
        self.core.fs()
    }

    /// Create the directory layout cores expect, then wait for the core's
    /// runtime to finish low-level initialization.
    ///
    /// Cores offer no event for the second step, so this is a bounded
    /// busy-wait at a fixed interval.
    pub async fn provision(&self) -> Result<()> {
        let fs = self.fs();
        for dir in layout::PROVISIONED_DIRS {
            mkdir_tree(fs.as_ref(), dir)?;
        }

        let mut waited = Duration::ZERO;
        while !self.core.is_runtime_initialized() {
            if waited >= self.poll.ready_timeout {
                return Err(Error::FileSystemTimeout {
                    path: layout::USERDATA_ROOT.to_string(),
                });
            }
            tokio::time::sleep(self.poll.ready_interval).await;
            waited += self.poll.ready_interval;
        }
        tracing::debug!(waited_ms = waited.as_millis() as u64, "core runtime initialized");
        Ok(())
    }

    /// Write an input's bytes to `path`, creating parent directories.
    ///
    /// The primitive cannot create directories while writing, so the bytes
    /// are staged at the root first and the staging entry removed afterwards.
    pub async fn write_file(&self, path: &str, input: &ResolvableInput) -> Result<()> {
        let data = input.load().await?;
        let fs = self.fs();

        let staging = format!(
            "/.staging-{}",
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        fs.write_file(&staging, &data)?;

        // The final file is copied from the staged entry, not the host buffer
        let written = fs.read_file(&staging).and_then(|staged| {
            mkdir_tree(fs.as_ref(), layout::parent(path))?;
            fs.write_file(path, &staged)
        });
        if let Err(e) = fs.unlink(&staging) {
            tracing::debug!(path = %staging, error = %e, "failed to remove staging file");
        }
        written?;

        tracing::debug!(path, bytes = data.len(), name = input.name(), "wrote file");
        Ok(())
    }

    /// Serialize a flat map in the core config format and write it.
    pub async fn write_config(&self, path: &str, map: &ConfigMap) -> Result<()> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let input = ResolvableInput::from_text(name, ini::stringify(map));
        self.write_file(path, &input).await
    }

    /// Read a file the core wrote, right now.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.fs().read_file(path)?)
    }

    /// Wait until the core has finished writing `path` and return its bytes.
    ///
    /// Sizes are sampled with exponentially growing waits. The file counts
    /// as written once the same non-zero size is seen at both ends of one
    /// interval; a single large reading proves nothing because the core may
    /// still be flushing.
    pub async fn wait_for_file(&self, path: &str) -> Result<Vec<u8>> {
        let fs = self.fs();
        let mut previous: Option<u64> = None;

        for attempt in 0..self.poll.max_retries {
            tokio::time::sleep(self.poll.backoff(attempt)).await;

            let current = match fs.file_size(path) {
                Ok(size) => Some(size),
                Err(e) => {
                    tracing::trace!(path, attempt, error = %e, "output not present yet");
                    None
                }
            };

            if let (Some(before), Some(after)) = (previous, current)
                && before > 0
                && before == after
            {
                tracing::debug!(path, bytes = after, attempt, "output stabilized");
                return Ok(fs.read_file(path)?);
            }
            previous = current;
        }

        Err(Error::FileSystemTimeout {
            path: path.to_string(),
        })
    }

    /// Best-effort delete; a missing file is the common case.
    pub fn unlink(&self, path: &str) {
        if let Err(e) = self.fs().unlink(path) {
            tracing::debug!(path, error = %e, "unlink skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::test_utils::{MockCore, fast_poll};
    use crate::vfs::{FsError, MemFs};

    fn bridge_for(core: &Arc<MockCore>) -> VirtualFileSystemBridge {
        VirtualFileSystemBridge::new(core.clone(), fast_poll())
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let poll = PollConfig::default();
        assert_eq!(poll.backoff(0), Duration::from_millis(100));
        assert_eq!(poll.backoff(1), Duration::from_millis(200));
        assert_eq!(poll.backoff(3), Duration::from_millis(800));
        assert_eq!(poll.backoff(4), Duration::from_secs(1));
        assert_eq!(poll.backoff(40), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn provision_creates_layout_and_waits_for_runtime() {
        let core = MockCore::new("fceumm");
        core.set_initialized(false);
        let bridge = bridge_for(&core);

        let flip = core.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flip.set_initialized(true);
        });

        bridge.provision().await.unwrap();
        for dir in layout::PROVISIONED_DIRS {
            assert!(core.memfs().is_dir(dir), "{} missing", dir);
        }
    }

    #[tokio::test]
    async fn provision_times_out_when_runtime_never_initializes() {
        let core = MockCore::new("fceumm");
        core.set_initialized(false);
        let mut poll = fast_poll();
        poll.ready_timeout = Duration::from_millis(20);
        let bridge = VirtualFileSystemBridge::new(core.clone(), poll);

        let err = bridge.provision().await.unwrap_err();
        assert!(matches!(err, Error::FileSystemTimeout { .. }));
    }

    #[tokio::test]
    async fn write_file_creates_parents_and_removes_staging() {
        let core = MockCore::new("fceumm");
        let bridge = bridge_for(&core);
        let input = ResolvableInput::from_bytes("rom.nes", vec![1, 2, 3]);

        bridge.write_file("/deep/nested/dir/rom.nes", &input).await.unwrap();

        assert_eq!(
            core.memfs().read_file("/deep/nested/dir/rom.nes").unwrap(),
            vec![1, 2, 3]
        );
        assert!(
            core.memfs().list("/").iter().all(|name| !name.starts_with(".staging")),
            "staging entry left behind"
        );
    }

    /// Filesystem that logs every write, read and unlink it serves.
    #[derive(Default)]
    struct RecordingFs {
        inner: MemFs,
        ops: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingFs {
        fn record(&self, op: &str, path: &str) {
            self.ops.lock().unwrap().push(format!("{} {}", op, path));
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    impl CoreFileSystem for RecordingFs {
        fn mkdir(&self, path: &str) -> std::result::Result<(), FsError> {
            self.inner.mkdir(path)
        }
        fn write_file(&self, path: &str, data: &[u8]) -> std::result::Result<(), FsError> {
            self.record("write", path);
            self.inner.write_file(path, data)
        }
        fn read_file(&self, path: &str) -> std::result::Result<Vec<u8>, FsError> {
            self.record("read", path);
            self.inner.read_file(path)
        }
        fn unlink(&self, path: &str) -> std::result::Result<(), FsError> {
            self.record("unlink", path);
            self.inner.unlink(path)
        }
        fn file_size(&self, path: &str) -> std::result::Result<u64, FsError> {
            self.inner.file_size(path)
        }
    }

    #[tokio::test]
    async fn write_file_copies_the_target_from_the_staged_entry() {
        let fs = Arc::new(RecordingFs::default());
        let core = MockCore::with_fs("fceumm", fs.clone());
        let bridge = bridge_for(&core);
        let input = ResolvableInput::from_bytes("bios.bin", vec![9, 8, 7]);

        bridge.write_file("/system/bios.bin", &input).await.unwrap();

        let ops = fs.ops();
        assert_eq!(ops.len(), 4, "{:?}", ops);
        let staging = ops[0].strip_prefix("write ").unwrap();
        assert!(staging.starts_with("/.staging-"));
        assert_eq!(ops[1], format!("read {}", staging));
        assert_eq!(ops[2], "write /system/bios.bin");
        assert_eq!(ops[3], format!("unlink {}", staging));
        assert_eq!(fs.inner.read_file("/system/bios.bin").unwrap(), vec![9, 8, 7]);
    }

    #[tokio::test]
    async fn write_config_renders_quoted_lines() {
        let core = MockCore::new("fceumm");
        let bridge = bridge_for(&core);
        let mut map = ConfigMap::new();
        map.insert("menu_driver".into(), "rgui".into());
        map.insert("video_smooth".into(), true.into());

        bridge.write_config("/cfg/retroarch.cfg", &map).await.unwrap();

        let text = String::from_utf8(core.memfs().read_file("/cfg/retroarch.cfg").unwrap()).unwrap();
        assert_eq!(text, "menu_driver = \"rgui\"\nvideo_smooth = \"true\"\n");
    }

    /// Filesystem whose size readings follow a script, one per `file_size` call.
    struct ScriptedSizes {
        inner: MemFs,
        stats: AtomicUsize,
        size_at: Box<dyn Fn(usize) -> Option<u64> + Send + Sync>,
    }

    impl ScriptedSizes {
        fn new(size_at: impl Fn(usize) -> Option<u64> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                inner: MemFs::new(),
                stats: AtomicUsize::new(0),
                size_at: Box::new(size_at),
            })
        }

        fn stats(&self) -> usize {
            self.stats.load(Ordering::SeqCst)
        }
    }

    impl CoreFileSystem for ScriptedSizes {
        fn mkdir(&self, path: &str) -> std::result::Result<(), FsError> {
            self.inner.mkdir(path)
        }
        fn write_file(&self, path: &str, data: &[u8]) -> std::result::Result<(), FsError> {
            self.inner.write_file(path, data)
        }
        fn read_file(&self, path: &str) -> std::result::Result<Vec<u8>, FsError> {
            self.inner.read_file(path)
        }
        fn unlink(&self, path: &str) -> std::result::Result<(), FsError> {
            self.inner.unlink(path)
        }
        fn file_size(&self, path: &str) -> std::result::Result<u64, FsError> {
            let call = self.stats.fetch_add(1, Ordering::SeqCst);
            (self.size_at)(call).ok_or_else(|| FsError::NotFound(path.to_string()))
        }
    }

    #[tokio::test]
    async fn wait_for_file_needs_two_equal_readings() {
        let sizes = [None, Some(10), Some(20), Some(20)];
        let fs = ScriptedSizes::new(move |call| sizes.get(call).copied().unwrap_or(Some(20)));
        fs.inner.write_file("/out.state", &[7; 20]).unwrap();
        let core = MockCore::with_fs("fceumm", fs.clone());
        let bridge = bridge_for(&core);

        let data = bridge.wait_for_file("/out.state").await.unwrap();

        assert_eq!(data, vec![7; 20]);
        // 10 then 20 differ; only the second 20 confirms the first
        assert_eq!(fs.stats(), 4);
    }

    #[tokio::test]
    async fn wait_for_file_times_out_on_ever_growing_file() {
        let fs = ScriptedSizes::new(|call| Some(call as u64 + 1));
        let core = MockCore::with_fs("fceumm", fs.clone());
        let mut poll = fast_poll();
        poll.max_retries = 6;
        let bridge = VirtualFileSystemBridge::new(core.clone(), poll);

        let err = bridge.wait_for_file("/growing.state").await.unwrap_err();

        assert!(matches!(err, Error::FileSystemTimeout { ref path } if path == "/growing.state"));
        assert_eq!(fs.stats(), 6);
    }

    #[tokio::test]
    async fn wait_for_file_ignores_empty_files() {
        let core = MockCore::new("fceumm");
        let mut poll = fast_poll();
        poll.max_retries = 4;
        let bridge = VirtualFileSystemBridge::new(core.clone(), poll);
        core.memfs().write_file("/empty.srm", b"").unwrap();

        let err = bridge.wait_for_file("/empty.srm").await.unwrap_err();
        assert!(matches!(err, Error::FileSystemTimeout { .. }));
    }

    #[tokio::test]
    async fn unlink_swallows_missing_files() {
        let core = MockCore::new("fceumm");
        let bridge = bridge_for(&core);
        bridge.unlink("/never/existed");
        core.memfs().write_file("/present", b"1").unwrap();
        bridge.unlink("/present");
        assert_eq!(
            core.memfs().read_file("/present"),
            Err(FsError::NotFound("/present".to_string()))
        );
    }
}
