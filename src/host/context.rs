//! # 宿主执行上下文
//!
//! ## 设计思路
//!
//! 宿主文档 API 只允许在其所属线程上调用。`HostContext` 把文档移交给一个专属线程，
//! 其余代码只持有可克隆的句柄，通过消息把闭包投递过去执行：
//!
//! - `run`：投递并异步等待返回值（读像素、建图层等）
//! - `post`：投递后立即返回（进度文本、消息提示）
//!
//! 所有任务按投递顺序串行执行，同一任务内的多步操作对文档而言是原子的。

use std::io;
use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use super::{HostDocument, HostFault};

/// 宿主线程名。
pub const HOST_THREAD_NAME: &str = "gimini-host";

type Job<D> = Box<dyn FnOnce(&mut D) + Send>;

/// 宿主线程句柄。克隆廉价，所有克隆共享同一线程与文档。
pub struct HostContext<D> {
    sender: mpsc::Sender<Job<D>>,
}

impl<D> Clone for HostContext<D> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<D: HostDocument> HostContext<D> {
    /// 启动宿主线程并移交文档。所有句柄被丢弃后线程退出，文档随之释放。
    pub fn spawn(document: D) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job<D>>();

        thread::Builder::new()
            .name(HOST_THREAD_NAME.to_string())
            .spawn(move || {
                let mut document = document;
                while let Ok(job) = receiver.recv() {
                    job(&mut document);
                }
                log::debug!("🔚 宿主线程退出");
            })?;

        Ok(Self { sender })
    }

    /// 在宿主线程上执行 `job` 并等待结果。
    pub async fn run<R, F>(&self, job: F) -> Result<R, HostFault>
    where
        F: FnOnce(&mut D) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Box::new(move |document: &mut D| {
                let _ = tx.send(job(document));
            }))
            .map_err(|_| HostFault::new("宿主线程已退出"))?;

        rx.await
            .map_err(|_| HostFault::new("宿主任务未返回结果（宿主线程可能已崩溃）"))
    }

    /// 投递任务后立即返回，不等待执行。
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce(&mut D) + Send + 'static,
    {
        if self.sender.send(Box::new(job)).is_err() {
            log::warn!("⚠️ 宿主线程已退出，丢弃投递的任务");
        }
    }
}
