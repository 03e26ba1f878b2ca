use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    common::{
        Context, DEFAULT_CHANNEL, DEFAULT_PRIORITY, Event, EventData, HandlerRef, ON_EXIT,
        ON_INIT, Result, SchedulerConfig, SchedulerError, handler_fn,
    },
    driver::{
        DispatchHandle, HandlerResult, MetricsSnapshot, SchedulerMetrics, SchedulerPlugin,
        WorkerPool,
        dispatch::{PluginChain, invoke},
        plugins::MetricsPlugin,
    },
    queue::EventQueue,
    scheduler::{HandlerModule, HandlerRegistry, Publisher, Subscriber},
    trigger::BoxTrigger,
};

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Stopped,
    Running,
    /// `stop()` 正在执行退出流程 (`ON_EXIT`、关闭工作池、插件 `on_stop`)
    Stopping,
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// `publish_with` 的可选参数
#[derive(Debug)]
pub struct PublishOptions {
    /// 为空时立即触发一次
    pub trigger: Option<BoxTrigger>,
    pub priority: i32,
    pub channel: String,
    pub reply_to: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            trigger: None,
            priority: DEFAULT_PRIORITY,
            channel: DEFAULT_CHANNEL.to_string(),
            reply_to: String::new(),
        }
    }
}

impl PublishOptions {
    pub fn with_trigger(mut self, trigger: BoxTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }
}

struct SchedulerInner {
    config: SchedulerConfig,
    /// 待触发事件
    queue: EventQueue,
    /// event_type -> handlers
    registry: HandlerRegistry,
    /// 共享上下文 (整体替换时换掉 Arc)
    context: RwLock<Arc<Context>>,
    /// 异步分发用的有界工作池
    pool: WorkerPool,
    /// 插件链 (MetricsPlugin 永远在首位)
    plugins: PluginChain,
    metrics: Arc<SchedulerMetrics>,
    /// STOPPED / RUNNING / STOPPING
    state: AtomicU8,
    /// `stop()` 时唤醒主循环
    stop_signal: Notify,
    /// 退出流程结束 (STOPPING -> STOPPED)
    stopped: Notify,
    /// 外部注入的停机信号 (多组件协同)
    shutdown: Option<CancellationToken>,
}

/// 事件调度器
///
/// 可廉价 Clone 的句柄，所有副本共享同一个队列、注册表和工作池。
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Default for Scheduler {
    /// 组合根使用的默认实例 (默认配置，无额外插件)
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.inner.config.name)
            .field("state", &self.state())
            .field("pending", &self.inner.queue.len())
            .field("handlers", &self.inner.registry.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// 按给定配置创建，不做校验
    ///
    /// 越界取值会被钳制 (轮询至少 1 ms，工作池至少 1 个 worker)。
    /// 需要拒绝非法配置时用 `SchedulerBuilder::build` 或 `SchedulerConfig::validate`。
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::from_parts(config, Context::new(), Vec::new(), None)
    }

    /// 组装 (供 Builder 使用)
    pub(crate) fn from_parts(
        config: SchedulerConfig,
        context: Context,
        user_plugins: Vec<Box<dyn SchedulerPlugin>>,
        shutdown: Option<CancellationToken>,
    ) -> Self {
        let metrics = Arc::new(SchedulerMetrics::default());
        // 指标插件放在首位，保证用户插件看到的是已更新的计数
        let mut plugins: Vec<Box<dyn SchedulerPlugin>> =
            vec![Box::new(MetricsPlugin::new(metrics.clone()))];
        plugins.extend(user_plugins);

        let pool = WorkerPool::new(config.worker.max_workers);
        let inner = SchedulerInner {
            config,
            queue: EventQueue::new(),
            registry: HandlerRegistry::new(),
            context: RwLock::new(Arc::new(context)),
            pool,
            plugins: Arc::new(plugins),
            metrics,
            state: AtomicU8::new(STOPPED),
            stop_signal: Notify::new(),
            stopped: Notify::new(),
            shutdown,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    // ==========================================
    // 状态 & 组件访问
    // ==========================================

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SchedulerState {
        match self.inner.state.load(Ordering::Acquire) {
            RUNNING => SchedulerState::Running,
            STOPPING => SchedulerState::Stopping,
            _ => SchedulerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == RUNNING
    }

    pub fn queue(&self) -> &EventQueue {
        &self.inner.queue
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.clone())
    }

    pub fn subscriber(&self) -> Subscriber {
        Subscriber::new(self.clone())
    }

    // ==========================================
    // Handler 注册
    // ==========================================

    /// 注册 Handler，同一个 Handler 重复注册返回 `false`
    pub fn register(&self, event_type: &str, handler: HandlerRef) -> bool {
        let added = self.inner.registry.register(event_type, handler.clone());
        if added {
            debug!(scheduler = %self.name(), event_type, handler = handler.name(), "Handler registered.");
        }
        added
    }

    /// 用异步闭包注册，返回句柄供之后 `unregister`
    pub fn register_fn<F, Fut, R>(&self, event_type: &str, name: &str, func: F) -> HandlerRef
    where
        F: Fn(Arc<Context>, Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler = handler_fn(name, func);
        self.register(event_type, handler.clone());
        handler
    }

    /// 移除一个 Handler (`Some`) 或该类型全部 Handler (`None`)
    pub fn unregister(&self, event_type: &str, handler: Option<&HandlerRef>) -> usize {
        let removed = self.inner.registry.unregister(event_type, handler);
        debug!(scheduler = %self.name(), event_type, removed, "Handler unregistered.");
        removed
    }

    /// 当前注册在某类型上的 Handler (快照)
    pub fn handlers(&self, event_type: &str) -> Vec<HandlerRef> {
        self.inner.registry.handlers(event_type)
    }

    /// 安装一组 Handler
    pub fn install<M: HandlerModule + ?Sized>(&self, module: &M) {
        module.register(self);
    }

    // ==========================================
    // 上下文
    // ==========================================

    pub fn context(&self) -> Arc<Context> {
        self.inner.context.read().clone()
    }

    /// 整体替换上下文，已在执行的 Handler 仍持有旧的快照
    pub fn set_context(&self, context: Context) {
        *self.inner.context.write() = Arc::new(context);
    }

    // ==========================================
    // 发布
    // ==========================================

    /// 发布事件
    ///
    /// - `trigger` 为空时立即触发一次。
    /// - 触发器已耗尽时事件被丢弃，返回 `false`。
    /// - 调度器未运行时事件照常入队，下次运行时处理。
    pub fn publish(&self, event: impl Into<Event>, trigger: Option<BoxTrigger>) -> bool {
        let event = event.into();
        let queued = self.inner.queue.put(event, trigger);
        if queued {
            self.inner.metrics.inc_published();
        } else {
            self.inner.metrics.inc_dropped();
        }
        queued
    }

    /// 按完整参数发布
    pub fn publish_with(&self, event_type: &str, data: EventData, options: PublishOptions) -> bool {
        let PublishOptions {
            trigger,
            priority,
            channel,
            reply_to,
        } = options;
        let event = Event::new(event_type)
            .with_data(data)
            .with_priority(priority)
            .with_channel(channel)
            .with_reply_to(reply_to);
        self.publish(event, trigger)
    }

    // ==========================================
    // 分发
    // ==========================================

    /// 立即分发
    ///
    /// - `Some(event)`: 绕过队列，直接交给该类型的所有 Handler。
    /// - `None`: 取出队列中所有已就绪的事件，逐个分发。
    ///
    /// `is_async = false` 时按注册顺序依次执行，返回已完成的句柄；
    /// `is_async = true` 时提交到工作池，返回 `Pending` 句柄。
    /// 工作池已关闭 (调度器已停止) 时异步分发返回 `SchedulerShutdown`。
    pub async fn trigger_event(
        &self,
        event: Option<Event>,
        is_async: bool,
    ) -> Result<Vec<DispatchHandle>> {
        if is_async && !self.inner.pool.is_accepting() {
            return Err(SchedulerError::SchedulerShutdown);
        }
        match event {
            Some(event) => self.dispatch(Arc::new(event), is_async).await,
            None => {
                let mut handles = Vec::new();
                while let Some(event) = self.inner.queue.try_get() {
                    handles.extend(self.dispatch(event, is_async).await?);
                }
                Ok(handles)
            }
        }
    }

    async fn dispatch(&self, event: Arc<Event>, is_async: bool) -> Result<Vec<DispatchHandle>> {
        if is_async {
            self.dispatch_async(event).await
        } else {
            Ok(self.dispatch_sync(event).await)
        }
    }

    /// 同步分发: 严格按注册顺序，一个结束再执行下一个
    async fn dispatch_sync(&self, event: Arc<Event>) -> Vec<DispatchHandle> {
        let handlers = self.begin_dispatch(&event).await;
        let ctx = self.context();
        let mut handles = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let name = handler.name().to_string();
            let result = invoke(&self.inner.plugins, handler, ctx.clone(), event.clone()).await;
            handles.push(DispatchHandle::Ready {
                handler: name,
                result,
            });
        }
        handles
    }

    /// 异步分发: 每个 Handler 调用独立提交到工作池
    ///
    /// 工作池已关闭时整个事件被拒绝，一个 Handler 都不会提交。
    /// 分发途中遇到并发 `stop()` 时，返回已提交的那部分句柄，其余 Handler 跳过。
    async fn dispatch_async(&self, event: Arc<Event>) -> Result<Vec<DispatchHandle>> {
        if !self.inner.pool.is_accepting() {
            return Err(SchedulerError::SchedulerShutdown);
        }
        let handlers = self.begin_dispatch(&event).await;
        let ctx = self.context();
        let mut handles = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let name = handler.name().to_string();
            let plugins = self.inner.plugins.clone();
            let fut = {
                let ctx = ctx.clone();
                let event = event.clone();
                async move { invoke(&plugins, handler, ctx, event).await }
            };
            match self.inner.pool.submit(fut) {
                Ok(join) => handles.push(DispatchHandle::Pending { handler: name, join }),
                Err(e) => {
                    warn!(
                        scheduler = %self.name(),
                        event_type = %event.event_type,
                        event_id = %event.id,
                        handler = %name,
                        submitted = handles.len(),
                        "Dispatch rejected: {}", e
                    );
                    break;
                }
            }
        }
        Ok(handles)
    }

    /// 分发前的公共步骤: 插件钩子 + Handler 快照
    async fn begin_dispatch(&self, event: &Event) -> Vec<HandlerRef> {
        for p in self.inner.plugins.iter() {
            p.before_dispatch(event).await;
        }
        let handlers = self.inner.registry.handlers(&event.event_type);
        if handlers.is_empty() {
            debug!(event_type = %event.event_type, event_id = %event.id, "No handler registered, event ignored.");
        } else {
            trace!(event_type = %event.event_type, event_id = %event.id, handlers = handlers.len(), "Dispatching event.");
        }
        handlers
    }

    /// 等待所有在途的异步 Handler 调用结束
    pub async fn wait_idle(&self) {
        self.inner.pool.wait_idle().await;
    }

    // ==========================================
    // 生命周期
    // ==========================================

    /// 启动 (幂等)
    ///
    /// 依次: 开放工作池 -> 插件 `on_start` -> 同步触发 `ON_INIT`。
    /// 上一次 `stop()` 还在执行退出流程时，先等它结束。
    pub async fn start(&self) {
        self.wait_stopped().await;
        if self
            .inner
            .state
            .compare_exchange(STOPPED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.inner.pool.reopen();
        for p in self.inner.plugins.iter() {
            p.on_start(self.name()).await;
        }
        info!(
            scheduler = %self.name(),
            max_workers = self.inner.pool.capacity(),
            pending = self.inner.queue.len(),
            "Scheduler started."
        );
        self.dispatch_sync(Arc::new(Event::new(ON_INIT))).await;
    }

    /// 停止 (幂等)
    ///
    /// 依次: 同步触发 `ON_EXIT` -> 关闭工作池 (在途任务继续执行完) -> 插件 `on_stop`。
    /// 其他任务正在停止时，等它的退出流程结束后再返回。
    /// 因此 `ON_EXIT` Handler 里不能再调用 `stop()`。
    pub async fn stop(&self) {
        if self
            .inner
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.wait_stopped().await;
            return;
        }
        self.inner.stop_signal.notify_waiters();
        self.dispatch_sync(Arc::new(Event::new(ON_EXIT))).await;
        self.inner.pool.close();
        for p in self.inner.plugins.iter() {
            p.on_stop(self.name()).await;
        }
        info!(
            scheduler = %self.name(),
            in_flight = self.inner.pool.in_flight(),
            pending = self.inner.queue.len(),
            "Scheduler stopped."
        );
        self.inner.state.store(STOPPED, Ordering::Release);
        self.inner.stopped.notify_waiters();
    }

    /// 等待进行中的退出流程结束
    async fn wait_stopped(&self) {
        loop {
            let stopped = self.inner.stopped.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();
            if self.inner.state.load(Ordering::Acquire) != STOPPING {
                return;
            }
            stopped.await;
        }
    }

    /// 主循环
    ///
    /// `catch_interrupt` 开启时 Ctrl-C 触发停机，否则一直运行到 `stop()`。
    pub async fn run(&self) {
        if self.inner.config.driver.catch_interrupt {
            self.run_until(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Interrupt received, shutting down."),
                    Err(e) => {
                        warn!("Failed to listen for interrupt: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            })
            .await;
        } else {
            self.run_until(std::future::pending::<()>()).await;
        }
    }

    /// 主循环，直到 `shutdown` 完成、外部停机信号触发或有人调用 `stop()`
    ///
    /// 就绪事件一律异步分发。退出时总会调用 `stop()`：
    /// 由其他任务发起的 `stop()` 也要等它的 `ON_EXIT` 执行完，然后等待工作池排空。
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start().await;

        let poll_timeout = self.inner.config.driver.poll_timeout();
        let external = self.inner.shutdown.clone();
        let cancelled = async move {
            match external {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(shutdown);
        tokio::pin!(cancelled);

        loop {
            let stopped = self.inner.stop_signal.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();
            if !self.is_running() {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = &mut cancelled => {
                    info!(scheduler = %self.name(), "Shutdown token cancelled.");
                    break;
                }
                _ = &mut stopped => break,
                res = self.inner.queue.get(poll_timeout) => match res {
                    Ok(event) => {
                        // 提交失败只可能是并发 stop，下一轮循环会退出
                        let _ = self.dispatch_async(event).await;
                    }
                    Err(e) if e.is_timeout() => continue,
                    Err(e) => warn!(scheduler = %self.name(), "Queue get failed: {}", e),
                },
            }
        }

        self.stop().await;
        self.inner.pool.wait_idle().await;
    }

    /// 批处理模式: 启动 -> 按顺序同步分发 -> 停止
    ///
    /// 返回每次 Handler 调用的结果 (不含生命周期事件)。
    pub async fn run_events(&self, events: Vec<Event>) -> Vec<HandlerResult> {
        self.start().await;
        let mut results = Vec::new();
        for event in events {
            for handle in self.dispatch_sync(Arc::new(event)).await {
                results.push(handle.wait().await);
            }
        }
        self.stop().await;
        results
    }
}
