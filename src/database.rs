use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};

use crate::auth::{Role, User};
use crate::config::AdminConfig;
use crate::create_timestamp;
use crate::judge::Aggregate;
use crate::language::Language;
use crate::problem::{
    Difficulty, Problem, ProblemDraft, ProblemSummary, ReferenceSolution, StartCode, Tag,
    TestCase,
};
use crate::submission::{Submission, SubmissionStatus};

const DATABASE_NAME: &str = "codearena.sqlite3";

/// Id of the administrator installed from configuration
pub const BOOTSTRAP_ADMIN_ID: i64 = 0;

const VISIBLE: &str = "visible";
const HIDDEN: &str = "hidden";

pub fn get_db_path() -> PathBuf {
    use directories::ProjectDirs;

    let proj_dirs =
        ProjectDirs::from("", "", "codearena").expect("Unable to find user directory");
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir).expect("Failed to create local data dir");

    data_dir.join(DATABASE_NAME)
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let db_url = format!("sqlite://{}", db_path.as_ref().display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(2)) // lock contention
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(4)
        .min_connections(0)
        .connect_with(options)
        .await?;

    let mut tx = db_pool.begin().await?;

    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER  PRIMARY KEY,
            name          TEXT     NOT NULL,
            email         TEXT     NOT NULL UNIQUE,
            role          TEXT     NOT NULL,
            created_time  TEXT     NOT NULL
        );",
        r"
        CREATE TABLE IF NOT EXISTS sessions (
            token         TEXT     PRIMARY KEY,
            user_id       INTEGER  NOT NULL,
            created_time  TEXT     NOT NULL,
            FOREIGN KEY (user_id)  REFERENCES users (id) ON DELETE CASCADE
        );",
        r"
        CREATE TABLE IF NOT EXISTS problems (
            id            INTEGER  PRIMARY KEY AUTOINCREMENT,
            title         TEXT     NOT NULL,
            description   TEXT     NOT NULL,
            difficulty    TEXT     NOT NULL,
            tags          TEXT     NOT NULL,
            creator_id    INTEGER  NOT NULL,
            created_time  TEXT     NOT NULL,
            updated_time  TEXT     NOT NULL,
            FOREIGN KEY (creator_id)  REFERENCES users (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS test_cases (
            problem_id    INTEGER  NOT NULL,
            visibility    TEXT     NOT NULL,
            case_index    INTEGER  NOT NULL,
            input         TEXT     NOT NULL,
            output        TEXT     NOT NULL,
            explanation   TEXT,
            PRIMARY KEY (problem_id, visibility, case_index),
            FOREIGN KEY (problem_id)  REFERENCES problems (id) ON DELETE CASCADE
        );",
        r"
        CREATE TABLE IF NOT EXISTS start_code (
            problem_id    INTEGER  NOT NULL,
            language      TEXT     NOT NULL,
            initial_code  TEXT     NOT NULL,
            PRIMARY KEY (problem_id, language),
            FOREIGN KEY (problem_id)  REFERENCES problems (id) ON DELETE CASCADE
        );",
        r"
        CREATE TABLE IF NOT EXISTS reference_solutions (
            problem_id    INTEGER  NOT NULL,
            language      TEXT     NOT NULL,
            solution      TEXT     NOT NULL,
            PRIMARY KEY (problem_id, language),
            FOREIGN KEY (problem_id)  REFERENCES problems (id) ON DELETE CASCADE
        );",
        r"
        CREATE TABLE IF NOT EXISTS submissions (
            id                 INTEGER  PRIMARY KEY AUTOINCREMENT,
            user_id            INTEGER  NOT NULL,
            problem_id         INTEGER  NOT NULL,
            code               TEXT     NOT NULL,
            language           TEXT     NOT NULL,
            status             TEXT     NOT NULL,
            runtime            REAL     NOT NULL DEFAULT 0,
            memory             INTEGER  NOT NULL DEFAULT 0,
            error_message      TEXT     NOT NULL DEFAULT '',
            test_cases_passed  INTEGER  NOT NULL DEFAULT 0,
            test_cases_total   INTEGER  NOT NULL DEFAULT 0,
            created_time       TEXT     NOT NULL,
            updated_time       TEXT     NOT NULL,
            FOREIGN KEY (user_id)     REFERENCES users (id) ON DELETE CASCADE,
            FOREIGN KEY (problem_id)  REFERENCES problems (id) ON DELETE CASCADE
        );",
        "CREATE INDEX IF NOT EXISTS idx_submissions_user_problem ON submissions(user_id, problem_id);",
        r"
        CREATE TABLE IF NOT EXISTS problem_solved (
            user_id       INTEGER  NOT NULL,
            problem_id    INTEGER  NOT NULL,
            solved_time   TEXT     NOT NULL,
            PRIMARY KEY (user_id, problem_id),
            FOREIGN KEY (user_id)     REFERENCES users (id) ON DELETE CASCADE,
            FOREIGN KEY (problem_id)  REFERENCES problems (id) ON DELETE CASCADE
        );",
    ] {
        sqlx::query(sql).execute(tx.as_mut()).await?;
    }

    tx.commit().await?;

    log::info!("Initialized database at {}", db_path.as_ref().display());

    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    // WAL and SHM files might not exist
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = std::fs::remove_file(&db_path) {
        log::warn!(
            "Unable to remove database at {}: {e}",
            db_path.as_ref().display()
        );
    } else {
        log::info!("Removed database at {}", db_path.as_ref().display());
    }
}

// ---------------------------------------------------------------- users

/// Installs the configured administrator as user 0 together with its
/// session token. Safe to run on every start.
pub async fn ensure_admin(pool: &SqlitePool, admin: &AdminConfig) -> sqlx::Result<()> {
    let now = create_timestamp();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
        INSERT INTO users (id, name, email, role, created_time)
        VALUES (?, ?, ?, 'admin', ?)
        ON CONFLICT (id) DO UPDATE SET name = excluded.name, email = excluded.email, role = 'admin'
        ",
    )
    .bind(BOOTSTRAP_ADMIN_ID)
    .bind(&admin.name)
    .bind(&admin.email)
    .bind(&now)
    .execute(tx.as_mut())
    .await?;

    sqlx::query("INSERT OR REPLACE INTO sessions (token, user_id, created_time) VALUES (?, ?, ?)")
        .bind(&admin.token)
        .bind(BOOTSTRAP_ADMIN_ID)
        .bind(&now)
        .execute(tx.as_mut())
        .await?;

    tx.commit().await
}

pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    role: Role,
) -> sqlx::Result<User> {
    let now = create_timestamp();
    let id = sqlx::query(
        "INSERT INTO users (name, email, role, created_time) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(email)
    .bind(role)
    .bind(&now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        role,
        created_time: now,
    })
}

pub async fn find_user(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, created_time FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Removes a user together with their sessions, submissions and solved
/// list. Returns `false` if there was no such user.
///
/// # Errors
///
/// A foreign key violation if the user still authors problems.
pub async fn delete_user(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let affected = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

/// Issues a fresh session token for `user_id`.
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> sqlx::Result<String> {
    let token = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id, created_time) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(create_timestamp())
        .execute(pool)
        .await?;
    Ok(token)
}

pub async fn find_session_user(pool: &SqlitePool, token: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r"
        SELECT u.id, u.name, u.email, u.role, u.created_time
        FROM sessions s JOIN users u ON u.id = s.user_id
        WHERE s.token = ?
        ",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

/// Returns whether a session was revoked
pub async fn revoke_session(pool: &SqlitePool, token: &str) -> sqlx::Result<bool> {
    let affected = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

// ------------------------------------------------------------- problems

#[derive(sqlx::FromRow)]
struct ProblemRow {
    id: i64,
    title: String,
    description: String,
    difficulty: Difficulty,
    tags: String,
    creator_id: i64,
    created_time: String,
    updated_time: String,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    title: String,
    difficulty: Difficulty,
    tags: String,
}

#[derive(sqlx::FromRow)]
struct CaseRow {
    visibility: String,
    input: String,
    output: String,
    explanation: Option<String>,
}

fn decode_tags(raw: &str) -> sqlx::Result<Vec<Tag>> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn encode_tags(tags: &[Tag]) -> sqlx::Result<String> {
    serde_json::to_string(tags).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

impl TryFrom<SummaryRow> for ProblemSummary {
    type Error = sqlx::Error;

    fn try_from(row: SummaryRow) -> sqlx::Result<Self> {
        Ok(ProblemSummary {
            id: row.id,
            title: row.title,
            difficulty: row.difficulty,
            tags: decode_tags(&row.tags)?,
        })
    }
}

/// Writes cases, start code and reference solutions of `problem_id`,
/// replacing whatever was there.
async fn write_problem_children(
    tx: &mut Transaction<'_, Sqlite>,
    problem_id: i64,
    draft: &ProblemDraft,
) -> sqlx::Result<()> {
    for table in ["test_cases", "start_code", "reference_solutions"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE problem_id = ?"))
            .bind(problem_id)
            .execute(tx.as_mut())
            .await?;
    }

    let cases = draft
        .visible_test_cases
        .iter()
        .enumerate()
        .map(|(i, c)| (VISIBLE, i, c))
        .chain(
            draft
                .hidden_test_cases
                .iter()
                .enumerate()
                .map(|(i, c)| (HIDDEN, i, c)),
        );
    for (visibility, index, case) in cases {
        sqlx::query(
            r"
            INSERT INTO test_cases (problem_id, visibility, case_index, input, output, explanation)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(problem_id)
        .bind(visibility)
        .bind(index as i64)
        .bind(&case.input)
        .bind(&case.output)
        .bind(&case.explanation)
        .execute(tx.as_mut())
        .await?;
    }

    for start in &draft.start_code {
        sqlx::query(
            "INSERT INTO start_code (problem_id, language, initial_code) VALUES (?, ?, ?)",
        )
        .bind(problem_id)
        .bind(start.language)
        .bind(&start.initial_code)
        .execute(tx.as_mut())
        .await?;
    }

    for reference in &draft.reference_solution {
        sqlx::query(
            "INSERT INTO reference_solutions (problem_id, language, solution) VALUES (?, ?, ?)",
        )
        .bind(problem_id)
        .bind(reference.language)
        .bind(&reference.solution)
        .execute(tx.as_mut())
        .await?;
    }

    Ok(())
}

pub async fn insert_problem(
    pool: &SqlitePool,
    creator_id: i64,
    draft: &ProblemDraft,
) -> sqlx::Result<i64> {
    let now = create_timestamp();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r"
        INSERT INTO problems (title, description, difficulty, tags, creator_id, created_time, updated_time)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.difficulty)
    .bind(encode_tags(&draft.tags)?)
    .bind(creator_id)
    .bind(&now)
    .bind(&now)
    .execute(tx.as_mut())
    .await?
    .last_insert_rowid();

    write_problem_children(&mut tx, id, draft).await?;

    tx.commit().await?;
    Ok(id)
}

/// Returns `false` if the problem does not exist
pub async fn replace_problem(
    pool: &SqlitePool,
    id: i64,
    editor_id: i64,
    draft: &ProblemDraft,
) -> sqlx::Result<bool> {
    let now = create_timestamp();
    let mut tx = pool.begin().await?;

    let affected = sqlx::query(
        r"
        UPDATE problems
        SET title = ?, description = ?, difficulty = ?, tags = ?, creator_id = ?, updated_time = ?
        WHERE id = ?
        ",
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.difficulty)
    .bind(encode_tags(&draft.tags)?)
    .bind(editor_id)
    .bind(&now)
    .bind(id)
    .execute(tx.as_mut())
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(false);
    }

    write_problem_children(&mut tx, id, draft).await?;

    tx.commit().await?;
    Ok(true)
}

/// Returns `false` if the problem does not exist
pub async fn delete_problem(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let affected = sqlx::query("DELETE FROM problems WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

/// Full problem including hidden cases.
///
/// # Errors
///
/// `sqlx::Error::RowNotFound` if there is no problem with this id.
pub async fn fetch_problem(pool: &SqlitePool, id: i64) -> sqlx::Result<Problem> {
    log::debug!("Trying to fetch problem {id} from database");

    let row = sqlx::query_as::<_, ProblemRow>(
        r"
        SELECT id, title, description, difficulty, tags, creator_id, created_time, updated_time
        FROM problems
        WHERE id = ?
        ",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    let case_rows = sqlx::query_as::<_, CaseRow>(
        r"
        SELECT visibility, input, output, explanation
        FROM test_cases
        WHERE problem_id = ?
        ORDER BY visibility, case_index
        ",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let mut visible_test_cases = Vec::new();
    let mut hidden_test_cases = Vec::new();
    for case in case_rows {
        let target = if case.visibility == VISIBLE {
            &mut visible_test_cases
        } else {
            &mut hidden_test_cases
        };
        target.push(TestCase {
            input: case.input,
            output: case.output,
            explanation: case.explanation,
        });
    }

    let start_code = sqlx::query_as::<_, (Language, String)>(
        "SELECT language, initial_code FROM start_code WHERE problem_id = ? ORDER BY language",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(language, initial_code)| StartCode {
        language,
        initial_code,
    })
    .collect();

    let reference_solution = sqlx::query_as::<_, (Language, String)>(
        "SELECT language, solution FROM reference_solutions WHERE problem_id = ? ORDER BY language",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(language, solution)| ReferenceSolution { language, solution })
    .collect();

    Ok(Problem {
        id: row.id,
        creator_id: row.creator_id,
        draft: ProblemDraft {
            title: row.title,
            description: row.description,
            difficulty: row.difficulty,
            tags: decode_tags(&row.tags)?,
            visible_test_cases,
            hidden_test_cases,
            start_code,
            reference_solution,
        },
        created_time: row.created_time,
        updated_time: row.updated_time,
    })
}

pub async fn list_problems(pool: &SqlitePool) -> sqlx::Result<Vec<ProblemSummary>> {
    sqlx::query_as::<_, SummaryRow>("SELECT id, title, difficulty, tags FROM problems ORDER BY id")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(ProblemSummary::try_from)
        .collect()
}

/// Adds `problem_id` to the solved list of `user_id`. Returns `false` if it
/// was already there.
pub async fn mark_problem_solved(
    pool: &SqlitePool,
    user_id: i64,
    problem_id: i64,
) -> sqlx::Result<bool> {
    let affected = sqlx::query(
        "INSERT OR IGNORE INTO problem_solved (user_id, problem_id, solved_time) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(problem_id)
    .bind(create_timestamp())
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected == 1)
}

pub async fn solved_problems(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<ProblemSummary>> {
    sqlx::query_as::<_, SummaryRow>(
        r"
        SELECT p.id, p.title, p.difficulty, p.tags
        FROM problem_solved s JOIN problems p ON p.id = s.problem_id
        WHERE s.user_id = ?
        ORDER BY s.solved_time, p.id
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(ProblemSummary::try_from)
    .collect()
}

// ---------------------------------------------------------- submissions

const SUBMISSION_COLUMNS: &str = "id, user_id, problem_id, code, language, status, runtime, memory, \
     error_message, test_cases_passed, test_cases_total, created_time, updated_time";

pub async fn create_pending_submission(
    pool: &SqlitePool,
    user_id: i64,
    problem_id: i64,
    language: Language,
    code: &str,
    total_cases: u32,
) -> sqlx::Result<i64> {
    let now = create_timestamp();
    let id = sqlx::query(
        r"
        INSERT INTO submissions (user_id, problem_id, code, language, status, test_cases_total, created_time, updated_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(user_id)
    .bind(problem_id)
    .bind(code)
    .bind(language)
    .bind(SubmissionStatus::Pending)
    .bind(total_cases)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Moves a pending submission to its terminal state. Submissions that are
/// no longer pending are left untouched.
pub async fn finish_submission(
    pool: &SqlitePool,
    id: i64,
    outcome: &Aggregate,
) -> sqlx::Result<()> {
    let affected = sqlx::query(
        r"
        UPDATE submissions
        SET status = ?, runtime = ?, memory = ?, error_message = ?, test_cases_passed = ?, updated_time = ?
        WHERE id = ? AND status = ?
        ",
    )
    .bind(outcome.status)
    .bind(outcome.runtime)
    .bind(outcome.memory as i64)
    .bind(&outcome.error_message)
    .bind(outcome.passed)
    .bind(create_timestamp())
    .bind(id)
    .bind(SubmissionStatus::Pending)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        log::warn!("Submission {id} was not pending, verdict discarded");
    }
    Ok(())
}

pub async fn fetch_submission(pool: &SqlitePool, id: i64) -> sqlx::Result<Submission> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn fetch_user_submissions(
    pool: &SqlitePool,
    user_id: i64,
    problem_id: i64,
) -> sqlx::Result<Vec<Submission>> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions \
         WHERE user_id = ? AND problem_id = ? ORDER BY created_time, id"
    ))
    .bind(user_id)
    .bind(problem_id)
    .fetch_all(pool)
    .await
}
