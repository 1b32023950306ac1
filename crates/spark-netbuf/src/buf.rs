use core::{
    fmt,
    ops::{Deref, DerefMut},
};

use tracing::{debug, trace};

use crate::{
    BufFlags, Pool, SimpleBuf, Timeout,
    pool::{BufId, BufLink, ReleaseStep, Slot, SlotBody},
    sync::{self, MutexGuard, Ordering},
};

const TARGET: &str = "spark_netbuf::buf";

/// 引用计数释放的结果。
#[must_use = "Deferred 携带忙标记持有者的句柄，丢弃会把描述符搁置到 reclaim_busy"]
#[derive(Debug)]
pub enum Release {
    /// 头部描述符已回到空闲集合（链上其余节点按各自计数处理）。
    Released,
    /// 仍有其他持有者，未发生回收。
    Shared,
    /// 最后一份引用遇到忙标记：描述符保持已分配，句柄连同这份引用交还给调用方，
    /// 由对应子系统清除标记后再次释放。
    Deferred(NetBuf),
}

/// `NetBuf` 是池中描述符的一份引用。
///
/// # 设计背景（Why）
/// - 同一报文会同时挂在重传缓存、朋友节点队列、广播承载层上，每个持有方各自贡献一份引用计数，
///   最后一个释放者负责把描述符交还缓冲池；
/// - 报文常被拆成“头部 + 若干分片”，分片链上的每一跳同样持有一份引用。
///
/// # 逻辑解析（How）
/// - 句柄内部保存所属池与槽位索引；引用计数与标志位位于槽位的原子字段上；
/// - 显式释放走 [`release_chain`](Self::release_chain)，返回 [`Release`] 告知结果；
/// - 句柄被丢弃时执行同样的释放流程，若遇到忙标记则把描述符搁置，交由 [`Pool::reclaim_busy`] 取回。
///
/// # 契约说明（What）
/// - `NetBuf` 不实现 `Clone`，新增引用必须显式调用 [`retain`](Self::retain)；
/// - 游标与用户数据通过守卫访问，守卫存续期间不要再次借用同一描述符的守卫；
/// - 已入队（[`NetBufQueue`](crate::NetBufQueue)）的描述符由队列持有，不能再被释放。
pub struct NetBuf {
    link: BufLink,
    armed: bool,
}

impl NetBuf {
    pub(crate) fn from_link(link: BufLink) -> Self {
        Self { link, armed: true }
    }

    /// 把句柄承载的那一份引用转交给链接，不触发释放。
    pub(crate) fn into_link(mut self) -> BufLink {
        self.armed = false;
        self.link.clone()
    }

    pub(crate) fn link(&self) -> &BufLink {
        &self.link
    }

    pub(crate) fn slot(&self) -> &Slot {
        self.link.slot()
    }

    pub fn id(&self) -> BufId {
        self.link.id()
    }

    /// 所属缓冲池。
    pub fn pool(&self) -> Pool {
        Pool::from_inner(self.link.pool.clone())
    }

    /// 当前引用计数。
    pub fn ref_count(&self) -> u16 {
        self.slot().refs.load(Ordering::Acquire)
    }

    pub fn flags(&self) -> BufFlags {
        self.slot().flags()
    }

    /// 增加一份引用并返回对应句柄。
    pub fn retain(&self) -> NetBuf {
        let updated = self
            .slot()
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| match refs {
                0 => None,
                refs => refs.checked_add(1),
            });
        let prev = match updated {
            Ok(prev) => prev,
            Err(0) => panic!("描述符 {} 已无持有者，不能再增加引用", self.id()),
            Err(_) => panic!("描述符 {} 引用计数溢出", self.id()),
        };
        trace!(target: TARGET, buf = %self.id(), refs = prev + 1, "引用计数递增");
        NetBuf::from_link(self.link.clone())
    }

    /// 释放这份引用；计数归零时回收描述符并沿分片链逐个释放。
    ///
    /// 链上每个节点各自递减一次：仍被共享的节点终止级联，带忙标记的节点被搁置。
    pub fn release_chain(self) -> Release {
        release_link(self.into_link())
    }

    /// 游标守卫，解引用为 [`SimpleBuf`]。
    pub fn cursor(&mut self) -> Cursor<'_> {
        Cursor {
            body: sync::lock(&self.link.slot().body),
        }
    }

    /// 用户数据守卫，长度为池声明的 `user_data_size`。
    pub fn user_data(&mut self) -> UserData<'_> {
        UserData {
            body: sync::lock(&self.link.slot().body),
        }
    }

    /// 当前数据长度。
    pub fn len(&self) -> usize {
        sync::lock(&self.slot().body).cursor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 设置忙标记；`marker` 只能包含 `BUSY_MASK` 中的位。
    pub fn mark_busy(&self, marker: BufFlags) {
        assert!(
            !marker.is_empty() && marker.is_busy_only(),
            "{marker:?} 不是忙标记"
        );
        self.slot().insert_flags(marker);
    }

    /// 清除忙标记。
    pub fn clear_busy(&self, marker: BufFlags) {
        assert!(marker.is_busy_only(), "{marker:?} 不是忙标记");
        self.slot().remove_flags(marker);
    }

    /// 下一个分片。
    pub fn frag_id(&self) -> Option<BufId> {
        sync::lock(&self.slot().links)
            .frag
            .as_ref()
            .map(BufLink::id)
    }

    /// 分片链的最后一个节点（无分片时为自身）。
    pub fn frag_last_id(&self) -> BufId {
        last_link(&self.link).id()
    }

    /// 把 `frag`（连同其后续分片）接到链尾，`frag` 的引用转交给链。
    pub fn frag_add(&mut self, frag: NetBuf) {
        let tail = last_link(&self.link);
        insert_after(&tail, frag);
    }

    /// 把 `frag`（连同其后续分片）插到当前节点之后，原后继接到 `frag` 链尾。
    pub fn frag_insert(&mut self, frag: NetBuf) {
        let link = self.link.clone();
        insert_after(&link, frag);
    }

    /// 摘下紧随其后的分片并返回其句柄；该分片之后的节点重新接到当前节点上。
    pub fn frag_del(&mut self) -> Option<NetBuf> {
        let removed = sync::lock(&self.slot().links).frag.take()?;
        let rest = sync::lock(&removed.slot().links).frag.take();
        sync::lock(&self.slot().links).frag = rest;
        Some(NetBuf::from_link(removed))
    }

    /// 整条分片链的数据总长度。
    pub fn frags_len(&self) -> usize {
        let mut total = 0;
        let mut current = Some(self.link.clone());
        while let Some(link) = current {
            total += sync::lock(&link.slot().body).cursor.len();
            current = sync::lock(&link.slot().links).frag.clone();
        }
        total
    }

    /// 在同一缓冲池中克隆描述符，数据与头部空间保持一致；分片链不随之复制。
    pub fn clone_buf(&self, timeout: Timeout) -> Option<NetBuf> {
        self.link.pool.clone_buf(usize::from(self.link.index), timeout)
    }

    /// 把游标恢复到刚分配时的状态；要求描述符不再挂有分片且只有一个持有者。
    pub fn reset(&mut self) {
        assert!(
            !self.flags().contains(BufFlags::FRAGS),
            "描述符 {} 仍处于队列分片链中",
            self.id()
        );
        assert!(self.frag_id().is_none(), "描述符 {} 仍挂有分片", self.id());
        assert!(self.ref_count() <= 1, "描述符 {} 仍被共享", self.id());
        self.cursor().reset();
    }

    /// 把忙标记持有的描述符搁置在池中，等待 `reclaim_busy`。
    fn park(self) {
        let link = self.into_link();
        link.slot().insert_flags(BufFlags::PARKED);
        debug!(target: TARGET, buf = %link.id(), "描述符因忙标记被搁置");
    }
}

impl Drop for NetBuf {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Release::Deferred(held) = release_link(self.link.clone()) {
            held.park();
        }
    }
}

impl fmt::Debug for NetBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetBuf")
            .field("id", &self.id())
            .field("refs", &self.ref_count())
            .field("flags", &self.flags())
            .finish()
    }
}

/// 游标守卫。
pub struct Cursor<'a> {
    body: MutexGuard<'a, SlotBody>,
}

impl Deref for Cursor<'_> {
    type Target = SimpleBuf;

    fn deref(&self) -> &SimpleBuf {
        &self.body.cursor
    }
}

impl DerefMut for Cursor<'_> {
    fn deref_mut(&mut self) -> &mut SimpleBuf {
        &mut self.body.cursor
    }
}

/// 用户数据守卫。
pub struct UserData<'a> {
    body: MutexGuard<'a, SlotBody>,
}

impl Deref for UserData<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.body.user_data
    }
}

impl DerefMut for UserData<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.body.user_data
    }
}

/// 释放链头的一份引用并沿分片链级联。
pub(crate) fn release_link(head: BufLink) -> Release {
    match head.pool.release_step(head.index) {
        ReleaseStep::Shared => Release::Shared,
        ReleaseStep::Busy => Release::Deferred(NetBuf::from_link(head)),
        ReleaseStep::Recycled(mut next) => {
            while let Some(link) = next {
                next = match link.pool.release_step(link.index) {
                    ReleaseStep::Shared => None,
                    ReleaseStep::Busy => {
                        NetBuf::from_link(link).park();
                        None
                    }
                    ReleaseStep::Recycled(frag) => frag,
                };
            }
            Release::Released
        }
    }
}

fn last_link(start: &BufLink) -> BufLink {
    let mut current = start.clone();
    loop {
        let next = sync::lock(&current.slot().links).frag.clone();
        match next {
            Some(link) => current = link,
            None => return current,
        }
    }
}

fn chain_contains(start: Option<BufLink>, id: BufId) -> bool {
    let mut current = start;
    while let Some(link) = current {
        if link.id() == id {
            return true;
        }
        current = sync::lock(&link.slot().links).frag.clone();
    }
    false
}

fn insert_after(anchor: &BufLink, frag: NetBuf) {
    assert!(
        anchor.id() != frag.id(),
        "描述符 {} 不能成为自身的分片",
        frag.id()
    );
    assert!(
        !chain_contains(Some(frag.link.clone()), anchor.id()),
        "描述符 {} 已在分片 {} 的链上，接入会成环",
        anchor.id(),
        frag.id()
    );
    let successor = sync::lock(&anchor.slot().links).frag.clone();
    assert!(
        !chain_contains(successor, frag.id()),
        "描述符 {} 已在 {} 之后的链上，接入会成环",
        frag.id(),
        anchor.id()
    );
    let frag = frag.into_link();
    let frag_tail = last_link(&frag);
    let old_next = sync::lock(&anchor.slot().links).frag.take();
    if let Some(old_next) = old_next {
        sync::lock(&frag_tail.slot().links).frag = Some(old_next);
    }
    sync::lock(&anchor.slot().links).frag = Some(frag);
}
