use duoyin::dict::{load_candidates, Readings};
use duoyin::pipeline::{BuildOutcome, CheckpointManager, Pipeline, RunOutcome, SchedulerOptions};
use duoyin::{ConversionError, PhoneticCapability, PolyphoneDictionary, RawSource, Tokenize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Per-character reading table standing in for a real pinyin library
struct Table(HashMap<char, Vec<&'static str>>);

impl Table {
    fn new() -> Self {
        let mut m = HashMap::new();
        m.insert('重', vec!["zhong", "chong"]);
        m.insert('庆', vec!["qing"]);
        m.insert('学', vec!["xue"]);
        m.insert('校', vec!["xiao"]);
        m.insert('行', vec!["xing", "hang"]);
        m.insert('银', vec!["yin"]);
        m.insert('长', vec!["chang", "zhang"]);
        m.insert('城', vec!["cheng"]);
        m.insert('大', vec!["da"]);
        m.insert('人', vec!["ren"]);
        Self(m)
    }
}

impl PhoneticCapability for Table {
    fn convert(&self, phrase: &str) -> Result<Readings, ConversionError> {
        Ok(phrase
            .chars()
            .map(|c| {
                self.0
                    .get(&c)
                    .map(|pys| pys.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default()
            })
            .collect())
    }
}

/// Raises the stop flag after a number of conversions
struct StopAfter {
    inner: Table,
    remaining: AtomicUsize,
    stop: Arc<AtomicBool>,
}

impl PhoneticCapability for StopAfter {
    fn convert(&self, phrase: &str) -> Result<Readings, ConversionError> {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.stop.store(true, Ordering::SeqCst);
        }
        self.inner.convert(phrase)
    }
}

fn options(workers: usize) -> SchedulerOptions {
    SchedulerOptions {
        workers,
        batch_size: 3,
        checkpoint_interval: 1,
        batch_timeout: None,
    }
}

fn all_pairs() -> BTreeSet<String> {
    let chars = ['重', '庆', '学', '校', '行', '银', '长', '城', '大', '人'];
    let mut text = String::new();
    for a in chars {
        for b in chars {
            if a != b {
                text.push(a);
                text.push(b);
                text.push('\n');
            }
        }
    }
    load_candidates(&[RawSource::text("pairs", Tokenize::WholeLine, text)])
}

async fn build(dir: &Path, candidates: &BTreeSet<String>, workers: usize) -> PolyphoneDictionary {
    let pipeline = Pipeline::new(
        Arc::new(Table::new()),
        options(workers),
        CheckpointManager::in_dir(dir),
    );
    match pipeline.build(candidates, &dir.join("pinyin_data.js")).await.unwrap() {
        BuildOutcome::Built(dict) => dict,
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_example() {
    let dir = tempfile::tempdir().unwrap();
    let candidates = load_candidates(&[RawSource::text("generic", Tokenize::WholeLine, "重庆\n学校\n")]);

    let dict = build(dir.path(), &candidates, 2).await;

    assert_eq!(dict.chars.len(), 1);
    assert_eq!(dict.chars["重"], vec!["zhong", "chong"]);
    assert_eq!(dict.phrases.len(), 1);
    assert_eq!(dict.phrases["重庆"], "zhong qing");

    let module = std::fs::read_to_string(dir.path().join("pinyin_data.js")).unwrap();
    assert!(module.contains("const POLYPHONE_CHARS"));
    assert!(module.contains("export { POLYPHONE_CHARS, POLYPHONE_PHRASES };"));
    // A finished build leaves no checkpoint behind
    assert!(!CheckpointManager::in_dir(dir.path()).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runs_are_idempotent() {
    let candidates = all_pairs();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    let a = build(first.path(), &candidates, 4).await;
    let b = build(second.path(), &candidates, 1).await;

    assert_eq!(a.phrases, b.phrases);
    assert_eq!(a.chars.keys().collect::<Vec<_>>(), b.chars.keys().collect::<Vec<_>>());
    for (c, pys) in &a.chars {
        let x: BTreeSet<_> = pys.iter().collect();
        let y: BTreeSet<_> = b.chars[c].iter().collect();
        assert_eq!(x, y);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_export_invariant_holds() {
    let dir = tempfile::tempdir().unwrap();
    let dict = build(dir.path(), &all_pairs(), 3).await;

    let keys: BTreeSet<&str> = dict.chars.keys().map(String::as_str).collect();
    assert_eq!(keys, BTreeSet::from(["行", "重", "长"]));
    for pys in dict.chars.values() {
        assert!(pys.iter().collect::<BTreeSet<_>>().len() >= 2);
    }
    for phrase in dict.phrases.keys() {
        assert!(phrase.chars().any(|c| keys.contains(c.to_string().as_str())));
    }
    assert!(!dict.phrases.contains_key("学校"));
    assert_eq!(dict.phrases["银行"], "yin xing");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resume_matches_uninterrupted_run() {
    let candidates = all_pairs();

    let reference_dir = tempfile::tempdir().unwrap();
    let reference = build(reference_dir.path(), &candidates, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let interrupted = Pipeline::with_stop(
        Arc::new(StopAfter {
            inner: Table::new(),
            remaining: AtomicUsize::new(20),
            stop: Arc::clone(&stop),
        }),
        options(1),
        CheckpointManager::in_dir(dir.path()),
        stop,
    );
    match interrupted.run(&candidates).await.unwrap() {
        RunOutcome::Interrupted {
            current_index,
            processed,
        } => {
            assert!(current_index >= 20 && current_index < candidates.len());
            assert_eq!(processed, current_index);
        }
        other => panic!("expected interruption, got {:?}", other),
    }
    assert!(CheckpointManager::in_dir(dir.path()).exists());

    let resumed = build(dir.path(), &candidates, 2).await;
    assert_eq!(resumed, reference);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_corrupt_checkpoint_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(CheckpointManager::in_dir(dir.path()).path(), "not json").unwrap();
    let candidates = load_candidates(&[RawSource::text("generic", Tokenize::WholeLine, "重庆\n学校\n")]);

    let dict = build(dir.path(), &candidates, 1).await;
    assert_eq!(dict.phrases.len(), 1);
}
