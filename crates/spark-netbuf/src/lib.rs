#![cfg_attr(not(feature = "std"), no_std)]

//! `spark-netbuf` 为 mesh 协议栈提供定长、引用计数的报文缓冲池。
//!
//! # 模块定位（Why）
//! - 承载层、传输层、朋友节点缓存共享同一批描述符：发送路径上同一报文可能同时被重传缓存、
//!   广播队列持有，接收路径上分段报文以分片链的形式逐段拼装；
//! - 目标平台没有通用堆，缓冲池在启动阶段一次性构造，运行期只做认领与回收。
//!
//! # 设计概要（How）
//! - [`Pool`]：描述符表 + 认领策略（[`AllocPolicy`]）+ 数据区策略（[`DataStrategy`]）；
//! - [`NetBuf`]：一份引用，显式 [`retain`](NetBuf::retain) / [`release_chain`](NetBuf::release_chain)，
//!   析构时自动释放；忙标记（[`BufFlags::BUSY_MASK`]）阻止回收；
//! - [`SimpleBuf`]：数据区上的头尾双向游标，支持小端/大端定宽字段；
//! - [`NetBufQueue`] / [`SimpleQueue`]：零分配的 FIFO，前者保留分片结构；
//! - 计数器更新与链拼接都在 [`IrqMask`] + 自旋锁构成的短临界区内完成。
//!
//! # 契约说明（What）
//! - 耗尽以 `None` 表达，永不阻塞；契约违背（越界、重复释放非本池描述符等）以 panic 终止；
//! - 声明期错误以 [`NetBufError`] 返回，附稳定错误码；
//! - 日志统一走 `tracing`，target 为 `spark_netbuf::*`，临界区内不记录日志。

extern crate alloc;

mod buf;
mod config;
mod critical;
mod data;
mod error;
mod flags;
mod pool;
mod queue;
mod simple;
mod sync;
mod timeout;

pub use buf::{Cursor, NetBuf, Release, UserData};
pub use config::{AllocPolicy, DestroyHook, PoolConfig, PoolLayout, PoolTable};
pub use critical::{IrqKey, IrqMask, NoIrqMask, install_irq_mask};
pub use data::{DataStrategy, ExternalAllocator};
pub use error::{NetBufError, Result, codes};
pub use flags::BufFlags;
pub use pool::{BufId, DescriptorState, Pool, PoolId, PoolStats};
pub use queue::{NetBufQueue, SimpleQueue};
pub use simple::SimpleBuf;
pub use timeout::Timeout;
