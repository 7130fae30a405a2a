use crate::error::{AppResult, ConfigError, FileError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_FILE: &str = "marking.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的提交数量
    pub max_concurrent_submissions: usize,
    /// 同时进行的 LLM 请求数量
    pub max_concurrent_requests: usize,
    /// 批量任务 TOML 文件存放目录
    pub jobs_folder: String,
    /// SQLite 数据库文件
    pub database_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 生成参考解答、标注错误
    pub solver_model: String,
    /// 拆分参考解答、评估难度
    pub decompose_model: String,
    /// 拆分学生解答、匹配评分、生成提示
    pub assistant_model: String,
    /// 识别图片中的手写解答
    pub vision_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    // --- 流水线参数 ---
    /// 每个评审请求包含的步骤数
    pub batch_size: usize,
    /// 空响应的补发轮数
    pub retry_rounds: usize,
    /// 补发轮次之间的等待时间（毫秒）
    pub retry_delay_ms: u64,
    /// 步骤拆分的最大尝试次数
    pub decompose_max_attempts: usize,
    /// 连续失败多少次后切换到推理模型
    pub escalate_after: usize,
    pub fast_model_tag: String,
    pub deep_model_tag: String,
    /// 匹配分数阈值，低于该值不做错误分析
    pub match_threshold: u8,
    pub match_max_attempts: usize,
    pub hint_max_attempts: usize,
    pub recognize_max_attempts: usize,
    /// 使用旧版相同的开闭标记
    pub legacy_highlight_markers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_submissions: 4,
            max_concurrent_requests: 8,
            jobs_folder: "jobs".to_string(),
            database_path: "data/database.db".to_string(),
            verbose_logging: false,
            output_log_file: "marking_log.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            solver_model: "Qwen/Qwen3-235B-A22B-Thinking-2507".to_string(),
            decompose_model: "Qwen/Qwen3-4B-Instruct-2507".to_string(),
            assistant_model: "Qwen/Qwen3-235B-A22B-Instruct-2507".to_string(),
            vision_model: "google/gemini-2.5-pro".to_string(),
            temperature: 0.6,
            max_tokens: 8192,
            batch_size: 10,
            retry_rounds: 2,
            retry_delay_ms: 1000,
            decompose_max_attempts: 10,
            escalate_after: 3,
            fast_model_tag: "Instruct".to_string(),
            deep_model_tag: "Thinking".to_string(),
            match_threshold: 80,
            match_max_attempts: 20,
            hint_max_attempts: 20,
            recognize_max_attempts: 5,
            legacy_highlight_markers: false,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 读取配置：有配置文件时先读文件，再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let path =
            std::env::var("MARKING_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 仅从环境变量读取（缺省项使用默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取，缺少的字段使用默认值
    pub fn from_toml_file(path: &str) -> Result<Self, FileError> {
        let content = std::fs::read_to_string(path).map_err(|e| FileError::read_failed(path, e))?;
        toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
            path: path.to_string(),
            source,
        })
    }

    fn with_env_overrides(self) -> Self {
        Self {
            max_concurrent_submissions: env_or(
                "MAX_CONCURRENT_SUBMISSIONS",
                self.max_concurrent_submissions,
            ),
            max_concurrent_requests: env_or(
                "MAX_CONCURRENT_REQUESTS",
                self.max_concurrent_requests,
            ),
            jobs_folder: std::env::var("JOBS_FOLDER").unwrap_or(self.jobs_folder),
            database_path: std::env::var("DATABASE_PATH").unwrap_or(self.database_path),
            verbose_logging: env_or("VERBOSE_LOGGING", self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            solver_model: std::env::var("SOLVER_MODEL").unwrap_or(self.solver_model),
            decompose_model: std::env::var("DECOMPOSE_MODEL").unwrap_or(self.decompose_model),
            assistant_model: std::env::var("ASSISTANT_MODEL").unwrap_or(self.assistant_model),
            vision_model: std::env::var("VISION_MODEL").unwrap_or(self.vision_model),
            temperature: env_or("LLM_TEMPERATURE", self.temperature),
            max_tokens: env_or("LLM_MAX_TOKENS", self.max_tokens),
            batch_size: env_or("BATCH_SIZE", self.batch_size),
            retry_rounds: env_or("RETRY_ROUNDS", self.retry_rounds),
            retry_delay_ms: env_or("RETRY_DELAY_MS", self.retry_delay_ms),
            decompose_max_attempts: env_or("DECOMPOSE_MAX_ATTEMPTS", self.decompose_max_attempts),
            escalate_after: env_or("ESCALATE_AFTER", self.escalate_after),
            fast_model_tag: std::env::var("FAST_MODEL_TAG").unwrap_or(self.fast_model_tag),
            deep_model_tag: std::env::var("DEEP_MODEL_TAG").unwrap_or(self.deep_model_tag),
            match_threshold: env_or("MATCH_THRESHOLD", self.match_threshold),
            match_max_attempts: env_or("MATCH_MAX_ATTEMPTS", self.match_max_attempts),
            hint_max_attempts: env_or("HINT_MAX_ATTEMPTS", self.hint_max_attempts),
            recognize_max_attempts: env_or("RECOGNIZE_MAX_ATTEMPTS", self.recognize_max_attempts),
            legacy_highlight_markers: env_or(
                "LEGACY_HIGHLIGHT_MARKERS",
                self.legacy_highlight_markers,
            ),
        }
    }

    /// 检查配置值是否合法
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_concurrent_submissions", self.max_concurrent_submissions),
            ("max_concurrent_requests", self.max_concurrent_requests),
            ("batch_size", self.batch_size),
            ("decompose_max_attempts", self.decompose_max_attempts),
            ("match_max_attempts", self.match_max_attempts),
            ("hint_max_attempts", self.hint_max_attempts),
            ("recognize_max_attempts", self.recognize_max_attempts),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "必须大于 0".to_string(),
                });
            }
        }
        if self.match_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                field: "match_threshold",
                reason: format!("{} 超出范围 [0, 100]", self.match_threshold),
            });
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
