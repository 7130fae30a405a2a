//! SQLite 存储 - 基础设施层
//!
//! 两张表：
//! - `tasks`：题目，`solution` 列缓存拆分好的参考解答（按题目条件精确匹配）
//! - `submission`：学生提交及批改状态
//!
//! 所有操作共用一个连接，由 `Mutex` 串行化；每次调用都准备新的语句。

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::submission::{join_hints, split_hints};
use crate::models::{Difficulty, SubmissionRecord, SubmissionStatus, TaskRecord};

const CREATE_TASKS: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        title      TEXT,
        statement  TEXT    NOT NULL,
        solution   TEXT    DEFAULT NULL,
        category   TEXT,
        difficulty TEXT
    )";

const CREATE_SUBMISSION: &str = "
    CREATE TABLE IF NOT EXISTS submission (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        statement  TEXT,
        solution   TEXT,
        status     TEXT,
        score      REAL,
        hints      TEXT,
        created_at TEXT
    )";

const TASK_COLUMNS: &str = "id, title, statement, solution, category, difficulty";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// 打开（必要时创建）数据库文件并执行迁移
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(3))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        info!("🗄️ 数据库已就绪: {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// 建表；旧库中缺少 `tasks.solution` 列时补上
    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(CREATE_TASKS, [])?;
        conn.execute(CREATE_SUBMISSION, [])?;

        for (table, column, ddl) in [
            ("tasks", "solution", "ALTER TABLE tasks ADD COLUMN solution TEXT DEFAULT NULL"),
            ("submission", "created_at", "ALTER TABLE submission ADD COLUMN created_at TEXT"),
        ] {
            if !has_column(&conn, table, column)? {
                info!("迁移: 为 {} 表添加 {} 列", table, column);
                conn.execute(ddl, [])?;
            }
        }
        Ok(())
    }

    // ========== submission ==========

    /// 新建提交，初始状态为 `Parsing`
    pub fn create_submission(&self, statement: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO submission (statement, status, created_at) VALUES (?1, ?2, ?3)",
            params![
                statement,
                SubmissionStatus::Parsing.as_str(),
                Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("创建提交 #{}", id);
        Ok(id)
    }

    pub fn update_submission(
        &self,
        id: i64,
        solution: &str,
        status: SubmissionStatus,
        hints: &[String],
        score: f64,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE submission SET solution = ?1, status = ?2, hints = ?3, score = ?4
             WHERE id = ?5",
            params![solution, status.as_str(), join_hints(hints), score, id],
        )?;
        debug!("提交 #{} -> {}", id, status.as_str());
        Ok(())
    }

    pub fn get_submission(&self, id: i64) -> Result<Option<SubmissionRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, statement, solution, status, score, hints, created_at
                 FROM submission WHERE id = ?1",
                params![id],
                |row| {
                    let status: Option<String> = row.get(3)?;
                    let hints: Option<String> = row.get(5)?;
                    Ok(SubmissionRecord {
                        id: row.get(0)?,
                        statement: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        solution: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        status: status.as_deref().and_then(SubmissionStatus::from_str),
                        score: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                        hints: hints.as_deref().map(split_hints).unwrap_or_default(),
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // ========== tasks ==========

    pub fn create_task(
        &self,
        title: Option<&str>,
        statement: &str,
        category: Option<&str>,
        difficulty: Option<Difficulty>,
    ) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (title, statement, category, difficulty) VALUES (?1, ?2, ?3, ?4)",
            params![title, statement, category, difficulty.map(|d| d.as_str())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_task_by_id(&self, id: i64) -> Result<Option<TaskRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        Ok(conn.query_row(&sql, params![id], task_from_row).optional()?)
    }

    /// 按题目条件精确查找（参考解答缓存的键）
    pub fn get_task_by_statement(&self, statement: &str) -> Result<Option<TaskRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM tasks WHERE statement = ?1 ORDER BY id LIMIT 1",
            TASK_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![statement], task_from_row)
            .optional()?)
    }

    /// 保存参考解答
    ///
    /// 题目已存在时更新 `solution`，`category` 和 `difficulty` 只在原来为空时写入；
    /// 不存在时新建。返回题目 id。
    pub fn save_task_solution(
        &self,
        statement: &str,
        solution: &str,
        category: Option<&str>,
        difficulty: Option<Difficulty>,
    ) -> Result<i64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, Option<String>)> = tx
            .query_row(
                "SELECT id, difficulty FROM tasks WHERE statement = ?1 ORDER BY id LIMIT 1",
                params![statement],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let id = match existing {
            Some((id, current)) => {
                tx.execute(
                    "UPDATE tasks SET solution = ?1, category = COALESCE(category, ?2)
                     WHERE id = ?3",
                    params![solution, category, id],
                )?;
                let missing = current.map_or(true, |d| d.trim().is_empty());
                if let (true, Some(difficulty)) = (missing, difficulty) {
                    tx.execute(
                        "UPDATE tasks SET difficulty = ?1 WHERE id = ?2",
                        params![difficulty.as_str(), id],
                    )?;
                }
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO tasks (statement, solution, category, difficulty)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![statement, solution, category, difficulty.map(|d| d.as_str())],
                )?;
                tx.last_insert_rowid()
            }
        };

        tx.commit()?;
        debug!("保存参考解答到题目 #{}", id);
        Ok(id)
    }

    pub fn unique_categories(&self) -> Result<Vec<String>, StoreError> {
        self.distinct_column("category")
    }

    pub fn unique_difficulties(&self) -> Result<Vec<String>, StoreError> {
        self.distinct_column("difficulty")
    }

    fn distinct_column(&self, column: &'static str) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT DISTINCT {c} FROM tasks WHERE {c} IS NOT NULL AND {c} != '' ORDER BY {c}",
            c = column
        );
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let difficulty: Option<String> = row.get(5)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        statement: row.get(2)?,
        solution: row.get(3)?,
        category: row.get(4)?,
        difficulty: difficulty.as_deref().and_then(Difficulty::from_str),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_submission("Solve x + 1 = 2").unwrap();

        let fresh = db.get_submission(id).unwrap().unwrap();
        assert_eq!(fresh.status, Some(SubmissionStatus::Parsing));
        assert!(fresh.created_at.is_some());
        assert!(fresh.hints.is_empty());

        let hints = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        db.update_submission(id, "x = 1", SubmissionStatus::Ok, &hints, 70.0)
            .unwrap();

        let done = db.get_submission(id).unwrap().unwrap();
        assert_eq!(done.solution, "x = 1");
        assert_eq!(done.status, Some(SubmissionStatus::Ok));
        assert_eq!(done.hints, hints);
        assert_eq!(done.score, 70.0);
    }

    #[test]
    fn test_missing_submission_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_submission(42).unwrap().is_none());
    }

    #[test]
    fn test_save_task_solution_keeps_existing_difficulty() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_task(Some("sum"), "Find 2 + 2", Some("arith"), Some(Difficulty::Easy))
            .unwrap();

        let saved = db
            .save_task_solution("Find 2 + 2", "1. 2 + 2 = 4", None, Some(Difficulty::Hard))
            .unwrap();
        assert_eq!(saved, id);

        let task = db.get_task_by_statement("Find 2 + 2").unwrap().unwrap();
        assert_eq!(task.cached_solution(), Some("1. 2 + 2 = 4"));
        assert_eq!(task.difficulty, Some(Difficulty::Easy));
        assert_eq!(task.category.as_deref(), Some("arith"));
    }

    #[test]
    fn test_save_task_solution_inserts_and_fills_difficulty() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .save_task_solution(
                "Solve x^2 = 4",
                "1. x = ±2",
                Some("algebra"),
                Some(Difficulty::Medium),
            )
            .unwrap();

        let task = db.get_task_by_id(id).unwrap().unwrap();
        assert_eq!(task.difficulty, Some(Difficulty::Medium));

        let untouched = db.create_task(None, "Blank task", None, None).unwrap();
        db.save_task_solution("Blank task", "1. ok", None, Some(Difficulty::Expert))
            .unwrap();
        let task = db.get_task_by_id(untouched).unwrap().unwrap();
        assert_eq!(task.difficulty, Some(Difficulty::Expert));
    }

    #[test]
    fn test_unique_categories_skip_empty() {
        let db = Database::open_in_memory().unwrap();
        db.create_task(None, "a", Some("geometry"), Some(Difficulty::Hard)).unwrap();
        db.create_task(None, "b", Some(""), None).unwrap();
        db.create_task(None, "c", Some("algebra"), Some(Difficulty::Hard)).unwrap();

        assert_eq!(db.unique_categories().unwrap(), vec!["algebra", "geometry"]);
        assert_eq!(db.unique_difficulties().unwrap(), vec!["hard"]);
    }

    #[test]
    fn test_open_is_idempotent_and_migrates_old_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.sqlite");

        {
            let conn = Connection::open({
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                &path
            })
            .unwrap();
            conn.execute_batch(
                "CREATE TABLE tasks (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT,
                     statement TEXT NOT NULL, category TEXT, difficulty TEXT);
                 INSERT INTO tasks (statement) VALUES ('old task');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        db.save_task_solution("old task", "1. done", None, None).unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        let task = db.get_task_by_statement("old task").unwrap().unwrap();
        assert_eq!(task.cached_solution(), Some("1. done"));
    }
}
