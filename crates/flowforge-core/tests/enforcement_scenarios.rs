//! End-to-end enforcement runs against fake adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use flowforge_core::checkers::quality::FileSize;
use flowforge_core::report::render_text;
use flowforge_core::scm::fakes::FakeSourceControl;
use flowforge_core::{
    AggregationPolicy, CapabilityTable, CheckInput, Checker, CheckerKind, CheckerRegistry,
    EnforcementContext, Engine, MemoryWorkspace, RuleResult, Severity, StagedFile, Verdict,
};
use flowforge_state::fakes::{MemoryAuditLog, MemoryStateStore, MemoryTokenStore};
use flowforge_state::{AuditLog, TokenStore};

/// Wraps a real checker and counts invocations.
struct Counting {
    inner: Box<dyn Checker>,
    calls: Arc<AtomicUsize>,
}

impl Checker for Counting {
    fn kind(&self) -> CheckerKind {
        self.inner.kind()
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.check(input)
    }
}

struct Harness {
    engine: Engine,
    audit: Arc<MemoryAuditLog>,
    tokens: Arc<MemoryTokenStore>,
    calls: Arc<AtomicUsize>,
}

fn harness(branch: Option<&str>, files: Vec<StagedFile>) -> Harness {
    harness_with_workspace(branch, files, MemoryWorkspace::new())
}

fn harness_with_workspace(
    branch: Option<&str>,
    files: Vec<StagedFile>,
    workspace: MemoryWorkspace,
) -> Harness {
    let audit = Arc::new(MemoryAuditLog::new());
    let tokens = Arc::new(MemoryTokenStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = CheckerRegistry::standard(CapabilityTable::standard()).with_checker(Box::new(
        Counting {
            inner: Box::new(FileSize::default()),
            calls: calls.clone(),
        },
    ));
    let engine = Engine::new(
        Arc::new(FakeSourceControl::new(branch, files)),
        Arc::new(MemoryStateStore::new()),
        tokens.clone(),
        audit.clone(),
        Arc::new(workspace),
    )
    .with_registry(registry);
    Harness {
        engine,
        audit,
        tokens,
        calls,
    }
}

fn source_lines(n: usize) -> String {
    (0..n).map(|i| format!("export const v{i} = {i};\n")).collect()
}

fn result<'a>(verdict: &'a Verdict, checker: &str) -> &'a RuleResult {
    verdict
        .results
        .iter()
        .find(|r| r.checker == checker)
        .unwrap_or_else(|| panic!("no {checker} result"))
}

async fn pre_commit(engine: &Engine, message: Option<&str>) -> Verdict {
    let mut request = flowforge_core::RunRequest::new(EnforcementContext::PreCommit);
    if let Some(message) = message {
        request = request.with_message(message);
    }
    engine.run(&request).await.unwrap()
}

#[tokio::test]
async fn oversized_source_file_blocks_with_split_suggestion() {
    let h = harness(
        Some("feature/12-foo"),
        vec![StagedFile::added("foo.ts", source_lines(750))],
    );
    let verdict = pre_commit(&h.engine, None).await;

    assert!(!verdict.passed());
    assert_eq!(verdict.exit_code(), 1);
    let size = result(&verdict, "file-size");
    assert_eq!(size.severity, Severity::Block);
    assert!(size.message.contains("Rule #24"));
    assert!(size.fix.as_deref().unwrap().contains("Split foo.ts"));
}

#[tokio::test]
async fn file_size_thresholds_hold_for_sources_and_never_block_tests() {
    let cases = [
        (1, Severity::Pass),
        (600, Severity::Pass),
        (601, Severity::Warn),
        (700, Severity::Warn),
        (701, Severity::Block),
        (1500, Severity::Block),
    ];
    for (lines, expected) in cases {
        let h = harness(
            Some("feature/12-foo"),
            vec![StagedFile::added("src/big.ts", source_lines(lines))],
        );
        let verdict = pre_commit(&h.engine, None).await;
        assert_eq!(result(&verdict, "file-size").severity, expected, "{lines} lines");

        for test_path in ["src/big.test.ts", "src/big.spec.js"] {
            let h = harness(
                Some("feature/12-foo"),
                vec![StagedFile::added(test_path, source_lines(lines))],
            );
            let verdict = pre_commit(&h.engine, None).await;
            assert_eq!(
                result(&verdict, "file-size").severity,
                Severity::Pass,
                "{test_path} with {lines} lines"
            );
        }
    }
}

#[tokio::test]
async fn bypass_token_skips_every_checker_and_is_audited() {
    let h = harness(
        Some("main"),
        vec![StagedFile::added("foo.ts", source_lines(750))],
    );
    let verdict = pre_commit(&h.engine, Some("feat: add login [skip-rules]")).await;

    assert!(verdict.passed());
    assert!(verdict.results.is_empty());
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);

    let notice = verdict.bypass.as_ref().unwrap();
    assert_eq!(notice.token, "[skip-rules]");

    let records = h.audit.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].token, "[skip-rules]");
    assert_eq!(records[0].branch.as_deref(), Some("main"));
    assert_eq!(records[0].message_summary, "feat: add login [skip-rules]");
    assert_eq!(records[0].changeset_digest.len(), 64);
    assert_eq!(notice.audit_id.as_deref(), Some(records[0].id.as_str()));

    assert_eq!(render_text(&verdict, false).lines().count(), 1);
}

#[tokio::test]
async fn every_bypass_token_passes_in_every_context() {
    for token in flowforge_core::BYPASS_TOKENS {
        for context in EnforcementContext::ALL {
            let h = harness(Some("master"), vec![]);
            let request =
                flowforge_core::RunRequest::new(context).with_message(format!("wip {token}"));
            let verdict = h.engine.run(&request).await.unwrap();
            assert!(verdict.passed(), "{token} in {context}");
            assert!(verdict.results.is_empty());
        }
    }
}

#[tokio::test]
async fn protected_branch_blocks_in_every_context() {
    for branch in ["main", "master", "develop"] {
        for context in EnforcementContext::ALL {
            let h = harness(Some(branch), vec![]);
            let request = flowforge_core::RunRequest::new(context).with_message("chore: x #5");
            let verdict = h.engine.run(&request).await.unwrap();
            assert!(
                result(&verdict, "protected-branch").is_block(),
                "{branch} in {context}"
            );
            assert!(!verdict.passed());
        }
    }
}

#[tokio::test]
async fn collect_all_reports_protected_branch_alongside_other_results() {
    let h = harness(
        Some("main"),
        vec![StagedFile::added("foo.ts", source_lines(750))],
    );
    let verdict = pre_commit(&h.engine, None).await;

    assert_eq!(verdict.results[0].checker, "protected-branch");
    assert!(verdict.results[0].is_block());
    assert_eq!(verdict.results.len(), 18);
    assert!(result(&verdict, "file-size").is_block());
    assert!(!verdict.halted_early);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fail_fast_stops_before_any_other_checker() {
    let h = harness(
        Some("main"),
        vec![StagedFile::added("foo.ts", source_lines(750))],
    );
    let engine = h.engine.with_policy(AggregationPolicy::FailFast);
    let verdict = pre_commit(&engine, None).await;

    assert_eq!(verdict.results.len(), 1);
    assert_eq!(verdict.results[0].checker, "protected-branch");
    assert!(verdict.halted_early);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unresolved_import_lists_every_candidate_once() {
    let h = harness(
        Some("feature/31-orders"),
        vec![StagedFile::added(
            "src/service/order.ts",
            "import { total } from './helpers';\n",
        )],
    );
    let verdict = pre_commit(&h.engine, None).await;

    let imports = result(&verdict, "import-paths");
    assert!(imports.is_block());
    let detail = &imports.findings[0].detail;
    let checked: Vec<&str> = detail
        .lines()
        .filter_map(|l| l.trim().strip_prefix("- "))
        .collect();
    let expected = [
        "src/service/helpers",
        "src/service/helpers.ts",
        "src/service/helpers.js",
        "src/service/helpers.tsx",
        "src/service/helpers.jsx",
        "src/service/helpers/index.ts",
        "src/service/helpers/index.js",
    ];
    assert_eq!(checked, expected);
    for candidate in expected {
        assert_eq!(checked.iter().filter(|c| **c == candidate).count(), 1);
    }
}

#[tokio::test]
async fn import_resolved_on_disk_passes() {
    let h = harness_with_workspace(
        Some("feature/31-orders"),
        vec![StagedFile::added(
            "src/service/order.ts",
            "import { total } from './helpers';\n",
        )],
        MemoryWorkspace::new().with_file("src/service/helpers/index.js", ""),
    );
    let verdict = pre_commit(&h.engine, None).await;
    assert_eq!(result(&verdict, "import-paths").severity, Severity::Pass);
}

#[tokio::test]
async fn identical_inputs_give_identical_verdicts() {
    let files = vec![
        StagedFile::added("foo.ts", source_lines(650)),
        StagedFile::added("notes.md", "no title\n"),
        StagedFile::added("src/service/order.ts", "import './missing';\n"),
    ];
    let h = harness(Some("spike"), files);
    let first = pre_commit(&h.engine, Some("wip")).await;
    let second = pre_commit(&h.engine, Some("wip")).await;
    assert_eq!(first, second);
    assert!(first.results.len() > 2);
}

#[tokio::test]
async fn agent_authorization_uses_active_tokens() {
    let files = vec![StagedFile::added(
        "migrations/010_refunds.sql",
        "CREATE TABLE refunds (id INT, created_at TEXT, updated_at TEXT);\n-- down\nDROP TABLE refunds;\n",
    )];

    let h = harness(Some("feature/9-refunds"), files.clone());
    let engine = h.engine.with_session_id("agent-3");
    let verdict = pre_commit(&engine, None).await;
    assert!(result(&verdict, "agent-authorization").is_block());

    let h = harness(Some("feature/9-refunds"), files);
    h.tokens
        .create("agent-3", "database", Duration::minutes(30))
        .await
        .unwrap();
    let engine = h.engine.with_session_id("agent-3");
    let verdict = pre_commit(&engine, None).await;
    assert_eq!(
        result(&verdict, "agent-authorization").severity,
        Severity::Pass
    );
}

#[tokio::test]
async fn verdict_counts_match_results() {
    let h = harness(
        Some("my-branch"),
        vec![
            StagedFile::added("foo.ts", source_lines(750)),
            StagedFile::added("notes.md", "# Notes\n"),
            StagedFile::added("src/a.test.ts", "it.only('x', () => {});\n"),
        ],
    );
    let verdict = pre_commit(&h.engine, None).await;
    let blocks = verdict.results.iter().filter(|r| r.is_block()).count();
    let warns = verdict.results.iter().filter(|r| r.is_warn()).count();
    assert_eq!(verdict.block_count, blocks);
    assert_eq!(verdict.warn_count, warns);
    assert!(blocks >= 3);
}
