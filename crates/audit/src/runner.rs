//! 병렬 스캔 러너 -- 고정 워커 풀과 그룹별 완료 카운터
//!
//! 고정된 수의 워커가 bounded 태스크 큐를 소비합니다. 모든 태스크는 [`ScanGroup`]에
//! 속하며, 그룹의 [`TaskGroup`] 카운터는 제출 시 증가하고 태스크(와 그 에러)의
//! 처리가 끝난 뒤 감소합니다. 태스크 에러는 하나의 unbounded 에러 채널로 모이고,
//! 어떤 실패도 다른 태스크를 취소하지 않습니다.
//!
//! # 종료 순서
//!
//! ```text
//! supervisor:  wait(Sca) + wait(JasSetup)
//!                   |
//!              wait(JasScanners)      <- JasSetup 그룹에서 fan-out
//!                   |
//!              submit cleanup -> wait(Cleanup)
//!                   |
//!              done() + close_errors()
//!                   |
//! run():       워커가 닫힌 큐를 비우고 종료
//! ```
//!
//! 스캐너 태스크는 JasSetup 그룹에 속한 태스크가 제출합니다.
//! [`spawn_detached`](ParallelScanRunner::spawn_detached)로 띄운 태스크도 자신이
//! 속한 그룹 카운터를 끝날 때까지 붙잡고 있으므로, JasSetup이 비워진 시점에
//! JasScanners 카운터는 이미 그 태스크들을 포함합니다.
//!
//! 제출은 큐가 가득 찼을 때만 대기합니다. 큐 용량보다 많은 태스크를 넣으려면
//! [`run`](ParallelScanRunner::run)이 먼저 워커를 띄워 두어야 합니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, mpsc};

use vigil_core::metrics as m;
use vigil_core::types::ScanCategory;

use crate::error::AuditError;

/// 기본 태스크 큐 용량
pub const DEFAULT_QUEUE_CAPACITY: usize = 20_000;

/// 박싱된 태스크 future
pub type ScanTask = Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + 'static>>;

/// 완료 그룹 (종료 순서대로 비워짐)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanGroup {
    /// lockfile 하나당 SCA 태스크 하나
    Sca,
    /// 분석기 설치와 스캐너 fan-out
    JasSetup,
    /// (모듈, 스캐너) 조합 하나당 태스크 하나
    JasScanners,
    /// 임시 디렉토리 해제 (가장 마지막)
    Cleanup,
}

impl ScanGroup {
    const ALL: [ScanGroup; 4] = [
        ScanGroup::Sca,
        ScanGroup::JasSetup,
        ScanGroup::JasScanners,
        ScanGroup::Cleanup,
    ];

    fn index(self) -> usize {
        match self {
            Self::Sca => 0,
            Self::JasSetup => 1,
            Self::JasScanners => 2,
            Self::Cleanup => 3,
        }
    }
}

/// 태스크 라벨 (메트릭 라벨과 패닉 보고에 사용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLabel {
    /// 스캔 카테고리에 속한 태스크
    Scan(ScanCategory),
    /// 분석기 설치와 스캐너 fan-out
    JasSetup,
    /// 임시 디렉토리 정리
    Cleanup,
}

impl TaskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scan(category) => category.as_str(),
            Self::JasSetup => "jas-setup",
            Self::Cleanup => "cleanup",
        }
    }
}

impl From<ScanCategory> for TaskLabel {
    fn from(category: ScanCategory) -> Self {
        Self::Scan(category)
    }
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 미완료 태스크 카운터 (0이 될 때까지 비동기 대기 가능)
#[derive(Debug, Default)]
pub struct TaskGroup {
    pending: AtomicUsize,
    notify: Notify,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.pending.fetch_add(n, Ordering::AcqRel);
    }

    /// 태스크 하나의 완료를 기록합니다. 카운트가 0이 되면 대기자를 깨웁니다.
    pub fn done(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => self.notify.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::error!("task group done() called more often than add()"),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// 그룹에 남은 태스크가 없을 때까지 대기합니다.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct QueuedTask {
    group: ScanGroup,
    label: TaskLabel,
    task: ScanTask,
}

/// 감사 태스크용 bounded 워커 풀
pub struct ParallelScanRunner {
    threads: usize,
    task_tx: Mutex<Option<mpsc::Sender<QueuedTask>>>,
    task_rx: Mutex<Option<mpsc::Receiver<QueuedTask>>>,
    error_tx: Mutex<Option<mpsc::UnboundedSender<AuditError>>>,
    error_rx: Mutex<Option<mpsc::UnboundedReceiver<AuditError>>>,
    groups: [TaskGroup; 4],
}

impl ParallelScanRunner {
    /// 워커 `threads`개와 용량 `queue_capacity`의 큐로 러너를 생성합니다.
    pub fn new(threads: usize, queue_capacity: usize) -> Result<Self, AuditError> {
        if threads == 0 {
            return Err(AuditError::Config {
                field: "threads".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if queue_capacity == 0 {
            return Err(AuditError::Config {
                field: "queue_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        let (task_tx, task_rx) = mpsc::channel(queue_capacity);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        Ok(Self {
            threads,
            task_tx: Mutex::new(Some(task_tx)),
            task_rx: Mutex::new(Some(task_rx)),
            error_tx: Mutex::new(Some(error_tx)),
            error_rx: Mutex::new(Some(error_rx)),
            groups: Default::default(),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn group(&self, group: ScanGroup) -> &TaskGroup {
        &self.groups[group.index()]
    }

    /// 태스크를 큐에 넣습니다. 큐가 가득 찬 동안에만 대기합니다.
    ///
    /// 실행 중인 태스크 안에서도 호출할 수 있습니다.
    ///
    /// # Errors
    ///
    /// [`done`](Self::done) 이후에는 `AuditError::Runner`를 반환합니다.
    pub async fn submit<F>(
        &self,
        group: ScanGroup,
        label: impl Into<TaskLabel>,
        task: F,
    ) -> Result<(), AuditError>
    where
        F: Future<Output = Result<(), AuditError>> + Send + 'static,
    {
        let label = label.into();
        let sender = lock(&self.task_tx).clone();
        let Some(sender) = sender else {
            return Err(AuditError::Runner(format!(
                "cannot submit {label} task: runner is closed"
            )));
        };

        self.group(group).add(1);
        let queued = QueuedTask {
            group,
            label,
            task: Box::pin(task),
        };
        if sender.send(queued).await.is_err() {
            self.group(group).done();
            return Err(AuditError::Runner(format!(
                "cannot submit {label} task: workers are gone"
            )));
        }
        metrics::counter!(m::AUDIT_TASKS_SUBMITTED_TOTAL, m::LABEL_CATEGORY => label.as_str())
            .increment(1);
        Ok(())
    }

    /// 워커 풀 밖에서 `task`를 실행합니다.
    ///
    /// 다른 그룹이 비워지기를 기다렸다가 후속 태스크를 제출하는 조정 태스크용입니다.
    /// 워커를 점유하지 않으므로 대기 중에도 큐는 계속 소비됩니다. `group` 카운터는
    /// 호출 즉시 증가하고 태스크가 끝나거나 패닉하면 감소합니다.
    pub fn spawn_detached<F>(self: &Arc<Self>, group: ScanGroup, label: TaskLabel, task: F)
    where
        F: Future<Output = Result<(), AuditError>> + Send + 'static,
    {
        self.group(group).add(1);
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.finish(group, label, tokio::spawn(task).await, None);
        });
    }

    /// 에러 채널에 에러를 넣습니다.
    pub fn add_error(&self, err: AuditError) {
        match lock(&self.error_tx).as_ref() {
            Some(tx) => {
                if let Err(rejected) = tx.send(err) {
                    tracing::error!(error = %rejected.0, "error collector is gone, error dropped");
                }
            }
            None => tracing::error!(error = %err, "error funnel already closed, error dropped"),
        }
    }

    /// 에러 채널의 수신단을 넘겨줍니다. 첫 호출만 받을 수 있습니다.
    pub fn take_error_receiver(&self) -> Option<mpsc::UnboundedReceiver<AuditError>> {
        lock(&self.error_rx).take()
    }

    /// 더 이상 태스크가 제출되지 않음을 알립니다.
    pub fn done(&self) {
        lock(&self.task_tx).take();
    }

    /// 에러 채널을 닫습니다. 수집기는 남은 에러를 모두 받은 뒤 종료합니다.
    pub fn close_errors(&self) {
        lock(&self.error_tx).take();
    }

    /// 워커를 시작하고, `done()` 신호 이후 받은 태스크가 모두 끝나면 반환합니다.
    pub async fn run(self: Arc<Self>) -> Result<(), AuditError> {
        let rx = lock(&self.task_rx)
            .take()
            .ok_or_else(|| AuditError::Runner("runner already started".to_owned()))?;
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        tracing::debug!(threads = self.threads, "starting scan workers");
        let workers: Vec<_> = (0..self.threads)
            .map(|id| tokio::spawn(Arc::clone(&self).worker(id, Arc::clone(&rx))))
            .collect();

        for (id, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::error!(worker = id, error = %e, "scan worker terminated abnormally");
                self.add_error(AuditError::Runner(format!("worker {id} failed: {e}")));
            }
        }
        tracing::debug!("all scan workers finished");
        Ok(())
    }

    async fn worker(
        self: Arc<Self>,
        id: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedTask>>>,
    ) {
        loop {
            let next = { rx.lock().await.recv().await };
            let Some(QueuedTask { group, label, task }) = next else {
                break;
            };
            // 패닉한 태스크도 완료로 집계되어야 함
            let outcome = tokio::spawn(task).await;
            self.finish(group, label, outcome, Some(id));
        }
        tracing::trace!(worker = id, "scan worker exiting");
    }

    fn finish(
        &self,
        group: ScanGroup,
        label: TaskLabel,
        outcome: Result<Result<(), AuditError>, tokio::task::JoinError>,
        worker: Option<usize>,
    ) {
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(e) => Some(AuditError::TaskPanicked {
                task: label,
                reason: e.to_string(),
            }),
        };
        if let Some(err) = failure {
            metrics::counter!(m::AUDIT_TASK_FAILURES_TOTAL).increment(1);
            tracing::warn!(worker = ?worker, task = %label, error = %err, "scan task failed");
            self.add_error(err);
        }
        self.group(group).done();
    }

    /// 그룹을 순서대로 비우고 Cleanup 그룹에서 `cleanup`을 실행한 뒤
    /// 큐와 에러 채널을 닫는 슈퍼바이저를 띄웁니다.
    ///
    /// 모든 태스크가 제출된 뒤에 호출해야 합니다.
    pub fn spawn_supervisor<F>(self: Arc<Self>, cleanup: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = Result<(), AuditError>> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::join!(
                self.group(ScanGroup::Sca).wait(),
                self.group(ScanGroup::JasSetup).wait()
            );
            self.group(ScanGroup::JasScanners).wait().await;

            match self.submit(ScanGroup::Cleanup, TaskLabel::Cleanup, cleanup).await {
                Ok(()) => self.group(ScanGroup::Cleanup).wait().await,
                Err(e) => self.add_error(e),
            }

            debug_assert!(ScanGroup::ALL.iter().all(|g| self.group(*g).pending() == 0));
            self.done();
            self.close_errors();
            tracing::debug!("all scan groups drained");
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
