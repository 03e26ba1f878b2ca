use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{
    error::{Result, SchedulerError},
    utils::default_scheduler_name,
};

// ==========================================
// 1. 工作池配置 (WorkerConfig)
// ==========================================
/// Handler 执行并发控制
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 工作池并发上限
    ///
    /// - 说明: 同时处于执行中的 Handler 调用数量上限 (信号量许可数)。
    /// - 默认值: 10
    /// - 影响: 超出上限的调用会排队等待许可，不会阻塞 Driver 主循环。
    pub max_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_workers: 10 }
    }
}

// ==========================================
// 2. 主循环配置 (DriverConfig)
// ==========================================
/// Driver 主循环行为
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// 单次阻塞等待队列的超时 (毫秒)
    ///
    /// - 说明: 主循环每隔这么久醒来检查一次运行标志，`stop()` 在一个超时周期内生效。
    /// - 默认值: 1000 ms
    pub poll_timeout_ms: u64,

    /// 是否在 `run()` 中监听 Ctrl-C
    ///
    /// - 默认值: true
    /// - 收到中断后主循环退出，并照常执行 `stop()` (触发退出事件)。
    pub catch_interrupt: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 1000,
            catch_interrupt: true,
        }
    }
}

impl DriverConfig {
    /// 轮询超时，至少 1 ms (0 会让主循环空转)
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }
}

// ==========================================
// 3. 总配置入口 (SchedulerConfig)
// ==========================================

/// 调度器总配置
///
/// 使用分层结构组织配置项。支持 `serde` 序列化，可直接从 JSON 加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 工作池
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 主循环
    #[serde(default)]
    pub driver: DriverConfig,

    /// 调度器实例名 (日志字段)
    /// 默认: `hostname-随机串`
    #[serde(default = "default_scheduler_name")]
    pub name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            driver: DriverConfig::default(),
            name: default_scheduler_name(),
        }
    }
}

impl SchedulerConfig {
    /// 快速创建一个开发环境配置
    pub fn new_dev() -> Self {
        let mut cfg = Self::default();
        // 开发/测试环境下轮询快一点，stop 更快生效
        cfg.driver.poll_timeout_ms = 100;
        cfg.driver.catch_interrupt = false;
        cfg
    }

    /// 从 JSON 字符串加载并校验
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: SchedulerConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker.max_workers == 0 {
            return Err(SchedulerError::Config(
                "worker.max_workers must be greater than 0".into(),
            ));
        }
        if self.driver.poll_timeout_ms == 0 {
            return Err(SchedulerError::Config(
                "driver.poll_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
