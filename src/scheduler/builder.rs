use tokio_util::sync::CancellationToken;

use crate::{
    common::{Context, HandlerRef, Result, SchedulerConfig},
    driver::SchedulerPlugin,
    scheduler::{HandlerModule, Scheduler},
};

/// 调度器构建器
///
/// 用于一步步配置并生成 Scheduler 实例。
pub struct SchedulerBuilder {
    /// 选填: 全局配置 (默认 `SchedulerConfig::default()`)
    config: Option<SchedulerConfig>,
    /// 选填: 初始上下文
    context: Option<Context>,
    /// 选填: 自定义插件链路 (排在内置 MetricsPlugin 之后)
    plugins: Vec<Box<dyn SchedulerPlugin>>,
    /// 选填: 预先注册的 Handler
    handlers: Vec<(String, HandlerRef)>,
    /// 选填: Handler 模块
    modules: Vec<Box<dyn HandlerModule>>,
    /// 全局停机信号 (可选注入，用于多组件协同)
    shutdown_token: Option<CancellationToken>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            context: None,
            plugins: Vec::new(),
            handlers: Vec::new(),
            modules: Vec::new(),
            shutdown_token: None,
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// [可选] 注入自定义插件
    /// 例如：审计、报警、自定义监控
    pub fn with_plugin<PL>(mut self, plugin: PL) -> Self
    where
        PL: SchedulerPlugin,
    {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn with_handler(mut self, event_type: impl Into<String>, handler: HandlerRef) -> Self {
        self.handlers.push((event_type.into(), handler));
        self
    }

    pub fn with_module<M>(mut self, module: M) -> Self
    where
        M: HandlerModule + 'static,
    {
        self.modules.push(Box::new(module));
        self
    }

    /// [可选] 外部停机信号，cancel 后 `run()` 退出
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    /// 构建 Scheduler
    ///
    /// 配置不合法时返回 `SchedulerError::Config`。
    /// 先注册单个 Handler，再按添加顺序安装模块。
    pub fn build(self) -> Result<Scheduler> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let scheduler = Scheduler::from_parts(
            config,
            self.context.unwrap_or_default(),
            self.plugins,
            self.shutdown_token,
        );
        for (event_type, handler) in self.handlers {
            scheduler.register(&event_type, handler);
        }
        for module in &self.modules {
            scheduler.install(module.as_ref());
        }
        Ok(scheduler)
    }
}
