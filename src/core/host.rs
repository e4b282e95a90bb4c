//! 后台执行宿主：让同步调用方（TUI 事件处理）在专用线程的单线程 tokio 运行时上执行 async 操作
//!
//! - `HostRegistry::ensure_running`：懒创建「运行时 + 工作线程」对；已停止则透明重建（并 join 旧线程）
//! - `HostHandle::submit`：把 async 操作投递到宿主，调用线程阻塞等待结果或超时；
//!   超时后触发该次调用的 CancellationToken，操作自行决定如何收尾
//!
//! 所有投递的操作都在同一个工作线程上协作式运行，互相之间不会并行。

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::SessionError;

static NEXT_HOST_ID: AtomicU64 = AtomicU64::new(1);

/// 进程级默认宿主（二进制入口使用；测试各自构造 HostRegistry 以隔离）
static GLOBAL_REGISTRY: HostRegistry = HostRegistry::new();

/// 宿主句柄：可跨线程克隆，用于投递操作
#[derive(Clone, Debug)]
pub struct HostHandle {
    id: u64,
    runtime: Handle,
    /// 工作线程退出时被取消
    stopped: CancellationToken,
}

impl HostHandle {
    /// 宿主代号；每次（重新）创建递增，用于判断是否为同一个宿主
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.is_cancelled()
    }

    /// 在宿主上执行 `op` 并阻塞等待，最多 `timeout`
    ///
    /// `op` 收到本次调用的 CancellationToken；超时后 token 被取消，但不保证操作立即停止。
    pub fn submit<T, F, Fut>(&self, op: F, timeout: Duration) -> Result<T, SessionError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, SessionError>> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_running() {
            return Err(SessionError::Host("execution host stopped".to_string()));
        }

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::sync_channel(1);
        let fut = op(token.clone());
        // JoinHandle 直接丢弃：任务脱离，结果只经 channel 回传
        let _task = self.runtime.spawn(async move {
            let _ = tx.send(fut.await);
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                token.cancel();
                tracing::warn!(host_id = self.id, ?timeout, "submitted operation timed out, cancellation requested");
                Err(SessionError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                if self.is_running() {
                    // 结果发送端未发送就被丢弃：操作 panic 或被中止
                    Err(SessionError::Operation(
                        "operation aborted before producing a result".to_string(),
                    ))
                } else {
                    Err(SessionError::Host("execution host stopped".to_string()))
                }
            }
        }
    }
}

/// 一个正在运行的「调度上下文 + 工作线程」对
pub struct ExecutionHost {
    handle: HostHandle,
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ExecutionHost {
    /// 创建单线程运行时并在新线程上驱动它，直到收到停止信号
    pub fn start() -> Result<Self, SessionError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SessionError::Host(format!("failed to build runtime: {e}")))?;
        let id = NEXT_HOST_ID.fetch_add(1, Ordering::Relaxed);
        let handle = HostHandle {
            id,
            runtime: runtime.handle().clone(),
            stopped: CancellationToken::new(),
        };

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let stopped = handle.stopped.clone();
        let thread = thread::Builder::new()
            .name(format!("nomu-host-{id}"))
            .spawn(move || {
                // 发送端被丢弃也视为停止
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
                stopped.cancel();
                runtime.shutdown_timeout(Duration::from_secs(1));
                tracing::debug!(host_id = id, "execution host thread exited");
            })
            .map_err(|e| SessionError::Host(format!("failed to spawn host thread: {e}")))?;

        tracing::info!(host_id = id, "execution host started");
        Ok(Self {
            handle,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &HostHandle {
        &self.handle
    }

    /// 发送停止信号并等待工作线程退出
    pub fn stop(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(host_id = self.handle.id, "execution host thread panicked");
            }
        }
    }
}

impl Drop for ExecutionHost {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// 宿主注册表：持有至多一个存活的 ExecutionHost，并发安全地懒创建 / 重建
pub struct HostRegistry {
    slot: Mutex<Option<ExecutionHost>>,
}

impl HostRegistry {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// 进程级默认注册表
    pub fn global() -> &'static HostRegistry {
        &GLOBAL_REGISTRY
    }

    /// 返回存活宿主的句柄；首次调用或宿主已停止时创建新宿主
    pub fn ensure_running(&self) -> Result<HostHandle, SessionError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(host) = slot.as_ref() {
            if host.handle.is_running() {
                return Ok(host.handle.clone());
            }
        }
        if let Some(stale) = slot.take() {
            tracing::warn!(host_id = stale.handle.id, "execution host found stopped, recreating");
            stale.stop();
        }
        let host = ExecutionHost::start()?;
        let handle = host.handle.clone();
        *slot = Some(host);
        Ok(handle)
    }

    /// 当前宿主的句柄（不创建）
    pub fn current(&self) -> Option<HostHandle> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|host| host.handle.clone())
    }

    /// ensure_running + submit
    pub fn submit<T, F, Fut>(&self, op: F, timeout: Duration) -> Result<T, SessionError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, SessionError>> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_running()?.submit(op, timeout)
    }

    /// 停止并回收当前宿主；之后的 ensure_running 会创建新宿主
    pub fn shutdown(&self) {
        let host = self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(host) = host {
            host.stop();
        }
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Barrier};
    use std::time::Instant;

    #[test]
    fn test_submit_returns_result() {
        let registry = HostRegistry::new();
        let value = registry
            .submit(|_| async { Ok::<_, SessionError>(21 * 2) }, Duration::from_secs(5))
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_operation_error_is_passed_through() {
        let registry = HostRegistry::new();
        let err = registry
            .submit(
                |_| async { Err::<(), _>(SessionError::Operation("boom".to_string())) },
                Duration::from_secs(5),
            )
            .unwrap_err();
        assert_eq!(err, SessionError::Operation("boom".to_string()));
    }

    #[test]
    fn test_operations_run_on_single_host_thread() {
        let registry = HostRegistry::new();
        let caller = thread::current().id();
        let first = registry
            .submit(|_| async { Ok(thread::current().id()) }, Duration::from_secs(5))
            .unwrap();
        let second = registry
            .submit(|_| async { Ok(thread::current().id()) }, Duration::from_secs(5))
            .unwrap();
        assert_eq!(first, second);
        assert_ne!(first, caller);
    }

    #[test]
    fn test_timeout_returns_promptly_and_cancels() {
        let registry = HostRegistry::new();
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();

        let start = Instant::now();
        let err = registry
            .submit(
                move |token| async move {
                    tokio::select! {
                        _ = token.cancelled() => flag.store(true, Ordering::SeqCst),
                        _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                    }
                    Ok(())
                },
                Duration::from_millis(200),
            )
            .unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(err, SessionError::Timeout(Duration::from_millis(200)));
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !observed.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panicking_operation_reports_error_and_host_survives() {
        let registry = HostRegistry::new();
        let handle = registry.ensure_running().unwrap();
        let err = handle
            .submit(
                |_| async {
                    if true {
                        panic!("operation exploded");
                    }
                    Ok::<(), SessionError>(())
                },
                Duration::from_secs(5),
            )
            .unwrap_err();
        assert!(matches!(err, SessionError::Operation(_)));
        assert!(handle.is_running());
        assert_eq!(registry.ensure_running().unwrap().id(), handle.id());
    }

    #[test]
    fn test_ensure_running_reuses_host() {
        let registry = HostRegistry::new();
        let a = registry.ensure_running().unwrap();
        let b = registry.ensure_running().unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_concurrent_first_use_starts_exactly_one_host() {
        let registry = Arc::new(HostRegistry::new());
        let barrier = Arc::new(Barrier::new(10));
        let workers: Vec<_> = (0..10)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.ensure_running().unwrap().id()
                })
            })
            .collect();
        let ids: HashSet<u64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_stopped_host_is_recreated_transparently() {
        let registry = HostRegistry::new();
        let old = registry.ensure_running().unwrap();
        registry.shutdown();
        assert!(!old.is_running());

        // 旧句柄检测到已停止，而不是阻塞
        let err = old
            .submit(|_| async { Ok::<_, SessionError>(1) }, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, SessionError::Host(_)));

        let value = registry
            .submit(|_| async { Ok::<_, SessionError>(7) }, Duration::from_secs(5))
            .unwrap();
        assert_eq!(value, 7);
        let fresh = registry.ensure_running().unwrap();
        assert_ne!(fresh.id(), old.id());
        assert!(fresh.is_running());
    }
}
