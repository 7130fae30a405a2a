//! 集成测试共用的假模型和装配函数

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use solution_marking::error::LlmError;
use solution_marking::infrastructure::{Database, TextCompletion, WorkerPool};
use solution_marking::{Config, MarkingFlow};
use tokio_util::sync::CancellationToken;

/// 按 prompt 的【标题】分派预设回复
///
/// 每个标题有一串回复，依次使用，最后一条重复使用。
pub struct ScriptedCompletion {
    rules: Vec<(String, Vec<Option<String>>)>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, title: &str, replies: &[&str]) -> Self {
        self.rules.push((
            title.to_string(),
            replies.iter().map(|r| Some(r.to_string())).collect(),
        ));
        self
    }

    /// 调用过的标题（按调用顺序）
    pub fn titles(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }

    pub fn count(&self, title: &str) -> usize {
        self.titles().iter().filter(|t| t.as_str() == title).count()
    }

    pub fn models_for(&self, title: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == title)
            .map(|(_, model)| model.clone())
            .collect()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, prompt: &str, model: &str) -> Result<Option<String>, LlmError> {
        let Some((title, replies)) = self
            .rules
            .iter()
            .find(|(title, _)| prompt.starts_with(title.as_str()))
        else {
            return Ok(None);
        };

        let mut calls = self.calls.lock().unwrap();
        let seen = calls.iter().filter(|(t, _)| t == title).count();
        calls.push((title.clone(), model.to_string()));

        Ok(replies[seen.min(replies.len() - 1)].clone())
    }
}

pub fn test_config() -> Config {
    Config {
        retry_delay_ms: 0,
        match_max_attempts: 5,
        hint_max_attempts: 5,
        ..Config::default()
    }
}

pub struct Harness {
    pub client: Arc<ScriptedCompletion>,
    pub db: Arc<Database>,
    pub flow: Arc<MarkingFlow>,
    pub cancel: CancellationToken,
}

pub fn harness(client: ScriptedCompletion) -> Harness {
    let config = test_config();
    let client = Arc::new(client);
    let db = Arc::new(Database::open_in_memory().unwrap());
    let cancel = CancellationToken::new();
    let pool = WorkerPool::new(
        client.clone(),
        config.max_concurrent_requests,
        config.retry_rounds,
        Duration::ZERO,
        cancel.clone(),
    );
    let flow = Arc::new(MarkingFlow::new(pool, db.clone(), &config));

    Harness {
        client,
        db,
        flow,
        cancel,
    }
}

pub const TASK: &str = "Decide which statements are true.";
pub const SUBMISSION: &str = "Step one is true.\nStep two is false.";

/// 一套完整的回复：第二步的 "false" 被标为错误
pub fn full_script(match_score: &str) -> ScriptedCompletion {
    ScriptedCompletion::new()
        .on("【匹配评分】", &[match_score])
        .on("【求解】", &["Both steps are checked."])
        .on("【步骤拆分】", &["1. Step one is true.\n2. Step two is false."])
        .on(
            "【错误标注】",
            &["1. Step one is true.\n2. Step two is [ERROR]false[ERROR]."],
        )
        .on(
            "【提示生成】",
            &["Hint 1: Re-read step two.\nHint 2: Check the claim.\nHint 3: Compare with the task."],
        )
        .on("【难度评估】", &["hard"])
}
