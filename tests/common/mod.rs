#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use actix_web::web;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use tokio_util::sync::CancellationToken;

use codearena::auth::Role;
use codearena::config::AdminConfig;
use codearena::cooldown::{Cooldown, MemoryCooldown};
use codearena::database as db;
use codearena::judge::{
    Evaluator, ExecutionRequest, ExecutionService, ExecutionToken, ExecutionVerdict, PollPolicy,
    ServiceError,
};
use codearena::language::Language;
use codearena::problem::{Difficulty, ProblemDraft, ReferenceSolution, StartCode, Tag, TestCase};

pub const ADMIN_TOKEN: &str = "admin-secret-token";

// Global counter to ensure unique test database names
static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

// Test guard that ensures cleanup on drop
pub struct TestDbGuard {
    db_path: PathBuf,
}

impl Drop for TestDbGuard {
    fn drop(&mut self) {
        db::remove_db(&self.db_path);
    }
}

// Helper function to create isolated test database with the admin installed
pub async fn create_test_db() -> (SqlitePool, TestDbGuard) {
    let test_id = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_path = std::env::temp_dir().join(format!(
        "codearena_test_{}_{}.sqlite3",
        std::process::id(),
        test_id
    ));

    // Leftovers of an aborted run
    db::remove_db(&db_path);

    let db_pool = db::init_db(&db_path).await.unwrap();
    db::ensure_admin(
        &db_pool,
        &AdminConfig {
            name: "root".to_string(),
            email: "root@localhost".to_string(),
            token: ADMIN_TOKEN.to_string(),
        },
    )
    .await
    .unwrap();

    (db_pool, TestDbGuard { db_path })
}

/// Creates a regular user and returns its id and bearer token
pub async fn create_test_user(pool: &SqlitePool, name: &str) -> (i64, String) {
    let user = db::create_user(pool, name, &format!("{name}@example.com"), Role::User)
        .await
        .unwrap();
    let token = db::create_session(pool, user.id).await.unwrap();
    (user.id, token)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

pub fn sample_draft() -> ProblemDraft {
    ProblemDraft {
        title: "Sum of Two".to_string(),
        description: "Read a and b, print a + b.".to_string(),
        difficulty: Difficulty::Easy,
        tags: vec![Tag::Math],
        visible_test_cases: vec![
            TestCase::visible("1 2", "3", "1 + 2 = 3"),
            TestCase::visible("10 5", "15", "10 + 5 = 15"),
        ],
        hidden_test_cases: vec![TestCase::hidden("2 2", "4"), TestCase::hidden("7 8", "15")],
        start_code: vec![StartCode {
            language: Language::Python,
            initial_code: "a, b = map(int, input().split())".to_string(),
        }],
        reference_solution: vec![ReferenceSolution {
            language: Language::Python,
            solution: "a, b = map(int, input().split())\nprint(a + b)".to_string(),
        }],
    }
}

pub fn accepted(time: f64, memory: u64) -> ExecutionVerdict {
    ExecutionVerdict {
        time: Some(time),
        memory: Some(memory),
        ..ExecutionVerdict::with_status(3)
    }
}

pub fn failed(status_id: u32, stderr: Option<&str>) -> ExecutionVerdict {
    ExecutionVerdict {
        time: Some(0.0),
        memory: Some(0),
        stderr: stderr.map(str::to_string),
        ..ExecutionVerdict::with_status(status_id)
    }
}

type VerdictFn = dyn Fn(&ExecutionRequest) -> ExecutionVerdict + Send + Sync;

#[derive(Default)]
struct FakeState {
    next_token: u32,
    requests: HashMap<String, (ExecutionRequest, u32)>,
    batch_sizes: Vec<usize>,
    status_calls: u32,
}

/// In-memory execution service.
///
/// Every token is reported as queued/processing for its first
/// `pending_rounds` status queries, then as whatever `verdict_for` decides.
pub struct FakeJudge {
    pending_rounds: u32,
    unavailable: bool,
    verdict_for: Box<VerdictFn>,
    state: Mutex<FakeState>,
}

impl FakeJudge {
    pub fn new(
        pending_rounds: u32,
        verdict_for: impl Fn(&ExecutionRequest) -> ExecutionVerdict + Send + Sync + 'static,
    ) -> Self {
        Self {
            pending_rounds,
            unavailable: false,
            verdict_for: Box::new(verdict_for),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Accepts everything
    pub fn accepting() -> Self {
        Self::new(0, |_| accepted(0.01, 1024))
    }

    /// Refuses every batch submission
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::accepting()
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batch_sizes.clone()
    }

    pub fn status_calls(&self) -> u32 {
        self.state.lock().unwrap().status_calls
    }

    pub fn submitted_requests(&self) -> Vec<ExecutionRequest> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<_> = state.requests.iter().collect();
        entries.sort_by_key(|(token, _)| {
            token
                .trim_start_matches("fake-")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        });
        entries.into_iter().map(|(_, (r, _))| r.clone()).collect()
    }
}

#[async_trait]
impl ExecutionService for FakeJudge {
    async fn submit_batch(
        &self,
        requests: &[ExecutionRequest],
    ) -> Result<Vec<ExecutionToken>, ServiceError> {
        if self.unavailable {
            return Err(ServiceError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.batch_sizes.push(requests.len());
        let mut tokens = Vec::with_capacity(requests.len());
        for request in requests {
            let token = format!("fake-{}", state.next_token);
            state.next_token += 1;
            state.requests.insert(token.clone(), (request.clone(), 0));
            tokens.push(ExecutionToken(token));
        }
        Ok(tokens)
    }

    async fn fetch_batch(
        &self,
        tokens: &[ExecutionToken],
    ) -> Result<Vec<ExecutionVerdict>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;

        let mut verdicts = Vec::with_capacity(tokens.len());
        for token in tokens {
            let Some((request, polls)) = state.requests.get_mut(token.as_str()) else {
                return Err(ServiceError::Rejected(format!("unknown token {}", token.as_str())));
            };
            *polls += 1;
            let verdict = if *polls <= self.pending_rounds {
                ExecutionVerdict::with_status(if *polls == 1 { 1 } else { 2 })
            } else {
                (self.verdict_for)(request)
            };
            verdicts.push(ExecutionVerdict {
                token: Some(token.clone()),
                ..verdict
            });
        }
        Ok(verdicts)
    }
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        max_rounds: 20,
    }
}

pub fn evaluator_with(judge: Arc<FakeJudge>) -> web::Data<Evaluator> {
    web::Data::new(Evaluator::new(
        judge,
        fast_policy(),
        CancellationToken::new(),
    ))
}

/// A cooldown whose window is over as soon as it starts
pub fn no_cooldown() -> web::Data<Cooldown> {
    web::Data::new(Cooldown::new(Arc::new(MemoryCooldown::new()), Duration::ZERO))
}

pub fn strict_cooldown() -> web::Data<Cooldown> {
    web::Data::new(Cooldown::new(
        Arc::new(MemoryCooldown::new()),
        Duration::from_secs(60),
    ))
}
