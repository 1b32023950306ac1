use alloc::{borrow::Cow, boxed::Box, sync::Arc, vec::Vec};
use core::{cmp, fmt, mem};

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::{
    BufFlags, NetBuf, SimpleBuf, Timeout,
    config::{AllocPolicy, DestroyHook, PoolConfig},
    critical::Exclusive,
    data::{DataOrigin, DataStrategy},
    error::Result,
    sync::{self, AtomicBool, AtomicU8, AtomicU16, AtomicUsize, Mutex, Ordering},
};

const TARGET: &str = "spark_netbuf::pool";

static NEXT_POOL_ID: core::sync::atomic::AtomicU16 = core::sync::atomic::AtomicU16::new(0);

/// 缓冲池标识，构造时分配，进程内唯一。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u16);

impl PoolId {
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// 描述符标识：所属池 + 槽位索引，二者都以显式字段保存，不依赖地址推算。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufId {
    pub pool: PoolId,
    pub index: u16,
}

impl fmt::Display for BufId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pool, self.index)
    }
}

/// 描述符生命周期状态（诊断用）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorState {
    /// 从未被认领。
    Uninitialized,
    /// 已认领；`refs` 为 0 时表示被忙标记搁置。
    Allocated { refs: u16 },
    /// 已回收，等待再次认领。
    Free,
}

/// 缓冲池统计快照。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 槽位总数。
    pub capacity: usize,
    /// 当前已分配的描述符数。
    pub active: usize,
    /// 可用缓冲诊断计数：分配时递减，真正释放时递增，恒不超过容量。
    pub available: usize,
    /// `ScanForFree` 策略的可用计数；`RingLazyInit` 为 `None`。
    pub free_count: Option<usize>,
    /// 从未被认领过的槽位数。
    pub uninitialized: usize,
    /// 槽位认领或数据区分配失败的累计次数。
    pub failed_acquisitions: usize,
    /// 真正释放（回到空闲集合）的累计次数。
    pub released_total: usize,
}

/// `Pool` 是定长、引用计数描述符表的共享句柄。
///
/// # 模块角色（Why）
/// - 协议栈所有报文都经由缓冲池流转：广播承载层、朋友节点队列、分段重组都从各自的池中认领描述符；
/// - 嵌入式目标没有通用堆，池在构造时一次性分配全部描述符与固定数据区，之后只做复用。
///
/// # 核心机制（How）
/// - 认领：在临界区内按 [`AllocPolicy`] 选出空闲槽位并置 `CLAIMED`，随即退出临界区；
/// - 供给：临界区之外向 [`DataStrategy`] 请求数据区，失败则把槽位退回空闲集合；
/// - 回收：引用计数归零（且无忙标记）时交还数据区、执行销毁钩子，最后在临界区内清空标志位。
///
/// # 契约说明（What）
/// - **容量**：任意时刻已分配描述符数不超过 `capacity()`，第 `capacity + 1` 个并发分配返回 `None`；
/// - **失败语义**：耗尽以 `None` 表达，从不阻塞；
/// - **线程安全**：`Pool` 可跨线程克隆共享，所有计数器更新都在临界区或原子操作中完成。
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// 按声明构造缓冲池。
    pub fn new(config: PoolConfig) -> Result<Self> {
        let region_len = config.validate()?;
        let id = PoolId(NEXT_POOL_ID.fetch_add(1, core::sync::atomic::Ordering::Relaxed));
        let capacity = usize::from(config.buf_count);

        let (mut region, data_size) = match &config.strategy {
            DataStrategy::Fixed { data_size } => (Some(BytesMut::zeroed(region_len)), *data_size),
            DataStrategy::External { .. } => (None, 0),
        };
        let slots: Vec<Slot> = (0..config.buf_count)
            .map(|index| {
                let fixed_region = region.as_mut().map(|r| r.split_to(data_size));
                Slot::new(index, fixed_region, config.user_data_size)
            })
            .collect();

        let inner = PoolInner {
            id,
            name: config.name,
            policy: config.policy,
            strategy: config.strategy,
            destroy: config.destroy,
            slots: slots.into_boxed_slice(),
            claim: Exclusive::new(ClaimState {
                uninit_count: capacity,
                free_count: capacity,
            }),
            metrics: PoolMetrics::new(capacity),
        };
        debug!(
            target: TARGET,
            pool = %inner.name,
            pool_id = id.get(),
            capacity,
            policy = ?inner.policy,
            "缓冲池已构造"
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub(crate) fn from_inner(inner: Arc<PoolInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn policy(&self) -> AllocPolicy {
        self.inner.policy
    }

    /// 认领一个描述符并为其分配 `size` 字节数据区。
    ///
    /// - 固定数据池的实际容量为 `min(size, data_size)`；外部分配器可以给出更大的容量；
    /// - `size == 0` 时不分配数据区；
    /// - `timeout` 只透传给外部分配器，槽位认领本身永远不等待。
    pub fn allocate(&self, size: usize, timeout: Timeout) -> Option<NetBuf> {
        self.inner.allocate(size, timeout)
    }

    /// 按池声明的默认大小分配。
    pub fn allocate_default(&self, timeout: Timeout) -> Option<NetBuf> {
        self.inner
            .allocate(self.inner.strategy.default_size(), timeout)
    }

    /// 以调用方提供的数据区构造描述符，`data` 的全部字节视为已写入的负载。
    ///
    /// 描述符带 `EXTERNAL_DATA` 标记，释放时不交还分配策略。
    pub fn allocate_with_data(&self, data: BytesMut) -> Option<NetBuf> {
        let index = self.inner.claim_slot()?;
        let capacity = data.len();
        let mut cursor = SimpleBuf::from_region(data, capacity);
        cursor.add(capacity);
        Some(
            self.inner
                .activate(index, cursor, DataOrigin::Caller, BufFlags::EXTERNAL_DATA),
        )
    }

    /// 直接把描述符归还空闲集合（仅 `ScanForFree`）。
    ///
    /// 清空全部标志位（包括忙标记）并递增可用计数；后续分片仍按引用计数释放。
    /// 调用方必须是唯一持有者；`RingLazyInit` 缓冲池只能经由引用计数回收。
    pub fn release(&self, buf: NetBuf) {
        assert!(
            Arc::ptr_eq(&buf.link().pool, &self.inner),
            "描述符 {} 不属于缓冲池 `{}`",
            buf.id(),
            self.inner.name
        );
        assert_eq!(
            self.inner.policy,
            AllocPolicy::ScanForFree,
            "RingLazyInit 缓冲池只能经由 release_chain 回收"
        );
        let link = buf.into_link();
        let slot = link.slot();
        let refs = slot.refs.load(Ordering::Acquire);
        assert!(refs <= 1, "描述符 {} 仍被 {refs} 个持有者引用，禁止直接释放", link.id());
        slot.refs.store(0, Ordering::Release);
        if let Some(frag) = self.inner.recycle(usize::from(link.index)) {
            drop(NetBuf::from_link(frag));
        }
    }

    /// 取回因忙标记被搁置的描述符，供其所属子系统清除标记后再次释放。
    ///
    /// 只有处于搁置状态（带 `PARKED`）的描述符会返回句柄，且只返回一次；句柄接管搁置期间保留的那一份引用。
    pub fn reclaim_busy(&self, index: u16) -> Option<NetBuf> {
        let slot = self.inner.slot(usize::from(index));
        slot.flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let flags = BufFlags::new(bits);
                flags
                    .contains(BufFlags::PARKED)
                    .then(|| flags.difference(BufFlags::PARKED).bits())
            })
            .ok()
            .map(|_| {
                NetBuf::from_link(BufLink {
                    pool: Arc::clone(&self.inner),
                    index,
                })
            })
    }

    /// 槽位 `index` 的生命周期状态。
    pub fn descriptor_state(&self, index: u16) -> DescriptorState {
        let slot = self.inner.slot(usize::from(index));
        if !slot.touched.load(Ordering::Acquire) {
            DescriptorState::Uninitialized
        } else if slot.flags().contains(BufFlags::CLAIMED) {
            DescriptorState::Allocated {
                refs: slot.refs.load(Ordering::Acquire),
            }
        } else {
            DescriptorState::Free
        }
    }

    /// 读取统计快照。
    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        let free_count = match inner.policy {
            AllocPolicy::ScanForFree => Some(inner.claim.lock().free_count),
            AllocPolicy::RingLazyInit => None,
        };
        PoolStats {
            capacity: inner.slots.len(),
            active: inner.metrics.active.load(Ordering::Relaxed),
            available: inner.metrics.available.load(Ordering::Relaxed),
            free_count,
            uninitialized: inner
                .slots
                .iter()
                .filter(|slot| !slot.touched.load(Ordering::Relaxed))
                .count(),
            failed_acquisitions: inner.metrics.failed.load(Ordering::Relaxed),
            released_total: inner.metrics.released.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.slots.len())
            .field("policy", &self.inner.policy)
            .field("strategy", &self.inner.strategy)
            .finish()
    }
}

/// 指向某个描述符槽位的链接，用于分片链与队列链。
///
/// 链接本身不计入引用计数；它承载的是“链上一个引用”的所有权语义，由持有者负责转移。
#[derive(Clone)]
pub(crate) struct BufLink {
    pub(crate) pool: Arc<PoolInner>,
    pub(crate) index: u16,
}

impl BufLink {
    pub(crate) fn slot(&self) -> &Slot {
        self.pool.slot(usize::from(self.index))
    }

    pub(crate) fn id(&self) -> BufId {
        self.pool.buf_id(usize::from(self.index))
    }
}

/// 单个描述符槽位。
///
/// - `refs`、`flags` 为原子量，认领扫描与忙标记判断无需获取槽位锁；
/// - `links` 保存两条互相独立的链：分片链与队列链；
/// - `body` 保存游标、数据区来源与用户数据，只被当前持有者访问。
pub(crate) struct Slot {
    pub(crate) index: u16,
    pub(crate) refs: AtomicU16,
    pub(crate) flags: AtomicU8,
    touched: AtomicBool,
    pub(crate) links: Mutex<SlotLinks>,
    pub(crate) body: Mutex<SlotBody>,
}

#[derive(Default)]
pub(crate) struct SlotLinks {
    pub(crate) frag: Option<BufLink>,
    pub(crate) queue_next: Option<BufLink>,
}

pub(crate) struct SlotBody {
    pub(crate) cursor: SimpleBuf,
    pub(crate) origin: DataOrigin,
    fixed_region: Option<BytesMut>,
    pub(crate) user_data: Box<[u8]>,
}

impl Slot {
    fn new(index: u16, fixed_region: Option<BytesMut>, user_data_size: usize) -> Self {
        Self {
            index,
            refs: AtomicU16::new(0),
            flags: AtomicU8::new(0),
            touched: AtomicBool::new(false),
            links: Mutex::new(SlotLinks::default()),
            body: Mutex::new(SlotBody {
                cursor: SimpleBuf::detached(),
                origin: DataOrigin::Empty,
                fixed_region,
                user_data: alloc::vec![0u8; user_data_size].into_boxed_slice(),
            }),
        }
    }

    pub(crate) fn flags(&self) -> BufFlags {
        BufFlags::new(self.flags.load(Ordering::Acquire))
    }

    pub(crate) fn insert_flags(&self, flags: BufFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub(crate) fn remove_flags(&self, flags: BufFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// 空闲槽位的标志位恒为 0，认领即置 `CLAIMED`。
    fn try_claim(&self) -> bool {
        self.flags
            .compare_exchange(
                0,
                BufFlags::CLAIMED.bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// 临界区保护的认领状态。
struct ClaimState {
    /// 环形倒计数：`capacity - uninit_count` 即下一个探查的槽位。
    uninit_count: usize,
    /// `ScanForFree` 的可用计数。
    free_count: usize,
}

impl ClaimState {
    fn advance_ring(&mut self, capacity: usize) -> usize {
        let uninit = self.uninit_count;
        self.uninit_count -= 1;
        if self.uninit_count == 0 {
            self.uninit_count = capacity;
        }
        capacity - uninit
    }
}

impl AllocPolicy {
    /// 在临界区内选出并认领一个空闲槽位。
    fn claim(self, state: &mut ClaimState, slots: &[Slot]) -> Option<usize> {
        let capacity = slots.len();
        match self {
            AllocPolicy::RingLazyInit => (0..capacity)
                .map(|_| state.advance_ring(capacity))
                .find(|&index| slots[index].try_claim()),
            AllocPolicy::ScanForFree => {
                if state.free_count == 0 {
                    return None;
                }
                state.free_count -= 1;
                let found = (0..capacity)
                    .map(|_| state.advance_ring(capacity))
                    .find(|&index| slots[index].try_claim());
                debug_assert!(found.is_some(), "可用计数大于 0 但没有空闲槽位");
                if found.is_none() {
                    state.free_count += 1;
                }
                found
            }
        }
    }

    /// 槽位回到空闲集合时的计数维护。
    fn on_idle(self, state: &mut ClaimState, capacity: usize) {
        if self == AllocPolicy::ScanForFree {
            state.free_count = cmp::min(state.free_count + 1, capacity);
        }
    }
}

struct PoolMetrics {
    active: AtomicUsize,
    available: AtomicUsize,
    failed: AtomicUsize,
    released: AtomicUsize,
}

impl PoolMetrics {
    fn new(capacity: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            available: AtomicUsize::new(capacity),
            failed: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }
}

fn saturating_dec(target: &AtomicUsize) {
    let _ = target.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(1))
    });
}

/// 引用计数递减一步的结果。
pub(crate) enum ReleaseStep {
    /// 仍有其他持有者。
    Shared,
    /// 计数归零但存在忙标记，描述符保持已分配状态。
    Busy,
    /// 已回收，携带原分片链的下一节点。
    Recycled(Option<BufLink>),
}

pub(crate) struct PoolInner {
    id: PoolId,
    name: Cow<'static, str>,
    policy: AllocPolicy,
    strategy: DataStrategy,
    destroy: Option<DestroyHook>,
    slots: Box<[Slot]>,
    claim: Exclusive<ClaimState>,
    metrics: PoolMetrics,
}

impl PoolInner {
    fn slot(&self, index: usize) -> &Slot {
        assert!(
            index < self.slots.len(),
            "槽位索引 {index} 超出缓冲池 `{}` 容量 {}",
            self.name,
            self.slots.len()
        );
        &self.slots[index]
    }

    fn buf_id(&self, index: usize) -> BufId {
        BufId {
            pool: self.id,
            index: self.slots[index].index,
        }
    }

    /// 临界区内认领槽位；失败时记录并返回 `None`。
    fn claim_slot(&self) -> Option<usize> {
        let claimed = {
            let mut state = self.claim.lock();
            self.policy.claim(&mut state, &self.slots)
        };
        if claimed.is_none() {
            self.metrics.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                target: TARGET,
                pool = %self.name,
                pool_id = self.id.get(),
                "缓冲池耗尽，认领失败"
            );
        }
        claimed
    }

    fn allocate(self: &Arc<Self>, size: usize, timeout: Timeout) -> Option<NetBuf> {
        let index = self.claim_slot()?;
        let supplied = if size == 0 {
            Some((SimpleBuf::detached(), DataOrigin::Empty))
        } else {
            self.supply(index, size, timeout)
        };
        let Some((cursor, origin)) = supplied else {
            self.rollback(index);
            warn!(
                target: TARGET,
                pool = %self.name,
                index,
                size,
                no_wait = timeout.is_no_wait(),
                "数据区分配失败，槽位已退回空闲集合"
            );
            return None;
        };
        Some(self.activate(index, cursor, origin, BufFlags::EMPTY))
    }

    /// 向分配策略请求数据区，调用时不持有任何临界区。
    fn supply(&self, index: usize, size: usize, timeout: Timeout) -> Option<(SimpleBuf, DataOrigin)> {
        match &self.strategy {
            DataStrategy::Fixed { data_size } => {
                let size = cmp::min(size, *data_size);
                let region = sync::lock(&self.slots[index].body).fixed_region.take();
                debug_assert!(region.is_some(), "空闲槽位缺少固定数据区");
                region.map(|region| (SimpleBuf::from_region(region, size), DataOrigin::Fixed))
            }
            DataStrategy::External { allocator, .. } => allocator
                .allocate(self.buf_id(index), size, timeout)
                .map(|region| {
                    let capacity = region.len();
                    (SimpleBuf::from_region(region, capacity), DataOrigin::External)
                }),
        }
    }

    /// 数据区分配失败：槽位退回空闲集合，避免泄漏。
    fn rollback(&self, index: usize) {
        self.metrics.failed.fetch_add(1, Ordering::Relaxed);
        let mut state = self.claim.lock();
        self.slots[index].flags.store(0, Ordering::Release);
        self.policy.on_idle(&mut state, self.slots.len());
    }

    /// 初始化刚认领的描述符并交出句柄。
    fn activate(
        self: &Arc<Self>,
        index: usize,
        cursor: SimpleBuf,
        origin: DataOrigin,
        extra: BufFlags,
    ) -> NetBuf {
        let slot = &self.slots[index];
        {
            let mut body = sync::lock(&slot.body);
            body.cursor = cursor;
            body.origin = origin;
        }
        debug_assert!(
            {
                let links = sync::lock(&slot.links);
                links.frag.is_none() && links.queue_next.is_none()
            },
            "空闲槽位残留链接"
        );
        slot.touched.store(true, Ordering::Release);
        slot.refs.store(1, Ordering::Release);
        slot.flags
            .store(BufFlags::CLAIMED.union(extra).bits(), Ordering::Release);
        self.metrics.active.fetch_add(1, Ordering::Relaxed);
        saturating_dec(&self.metrics.available);
        debug!(target: TARGET, pool = %self.name, index, "描述符已分配");
        NetBuf::from_link(BufLink {
            pool: Arc::clone(self),
            index: slot.index,
        })
    }

    /// 引用计数递减一步；归零且无忙标记时回收。
    ///
    /// 最后一份引用遇到忙标记时计数保持为 1，由交还的句柄（或搁置状态）继续持有。
    pub(crate) fn release_step(&self, index: u16) -> ReleaseStep {
        let slot = self.slot(usize::from(index));
        let updated = slot
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| match refs {
                0 => None,
                1 if slot.flags().is_busy() => None,
                refs => Some(refs - 1),
            });
        let prev = match updated {
            Ok(prev) => prev,
            Err(0) => panic!(
                "描述符 {} 的引用计数已为 0，重复释放",
                self.buf_id(usize::from(index))
            ),
            Err(_) => {
                debug!(
                    target: TARGET,
                    pool = %self.name,
                    index,
                    flags = ?slot.flags(),
                    "忙标记阻止释放"
                );
                return ReleaseStep::Busy;
            }
        };
        if prev > 1 {
            return ReleaseStep::Shared;
        }
        ReleaseStep::Recycled(self.recycle(usize::from(index)))
    }

    /// 交还数据区、执行销毁钩子并把槽位放回空闲集合，返回原分片链的下一节点。
    pub(crate) fn recycle(&self, index: usize) -> Option<BufLink> {
        let slot = &self.slots[index];
        let id = self.buf_id(index);
        let flags = slot.flags();

        let (region, origin) = {
            let mut body = sync::lock(&slot.body);
            let cursor = mem::replace(&mut body.cursor, SimpleBuf::detached());
            let origin = mem::replace(&mut body.origin, DataOrigin::Empty);
            (cursor.into_region(), origin)
        };
        let frag = {
            let mut links = sync::lock(&slot.links);
            debug_assert!(links.queue_next.is_none(), "仍在队列中的描述符被释放");
            links.frag.take()
        };

        if flags.contains(BufFlags::EXTERNAL_DATA) {
            drop(region);
        } else {
            match (origin, &self.strategy) {
                (DataOrigin::Fixed, _) => sync::lock(&slot.body).fixed_region = Some(region),
                (DataOrigin::External, DataStrategy::External { allocator, .. }) => {
                    allocator.release(id, region)
                }
                _ => drop(region),
            }
        }

        let available = self.metrics.available.fetch_add(1, Ordering::Relaxed) + 1;
        assert!(
            available <= self.slots.len(),
            "缓冲池 `{}` 可用计数 {available} 超过容量",
            self.name
        );
        saturating_dec(&self.metrics.active);
        self.metrics.released.fetch_add(1, Ordering::Relaxed);

        if let Some(hook) = &self.destroy {
            hook(id);
        }

        {
            let mut state = self.claim.lock();
            slot.refs.store(0, Ordering::Release);
            slot.flags.store(0, Ordering::Release);
            self.policy.on_idle(&mut state, self.slots.len());
        }
        debug!(target: TARGET, pool = %self.name, index, "描述符已回收");
        frag
    }

    /// 克隆描述符：同池分配，负载与头部空间保持一致。
    pub(crate) fn clone_buf(
        self: &Arc<Self>,
        source: usize,
        timeout: Timeout,
    ) -> Option<NetBuf> {
        let src_slot = &self.slots[source];
        let (origin, capacity) = {
            let body = sync::lock(&src_slot.body);
            (body.origin, body.cursor.capacity())
        };
        match (origin, &self.strategy) {
            (DataOrigin::Caller, _) => {
                let index = self.claim_slot()?;
                let cursor = {
                    let body = sync::lock(&src_slot.body);
                    let mut cursor = SimpleBuf::from_region(body.cursor.region().clone(), capacity);
                    cursor.adopt_offsets(&body.cursor);
                    cursor
                };
                Some(self.activate(index, cursor, DataOrigin::Caller, BufFlags::EXTERNAL_DATA))
            }
            (DataOrigin::External, DataStrategy::External { allocator, .. }) => {
                let index = self.claim_slot()?;
                let retained = {
                    let body = sync::lock(&src_slot.body);
                    allocator
                        .retain(self.buf_id(index), body.cursor.region())
                        .map(|region| {
                            let capacity = region.len();
                            let mut cursor = SimpleBuf::from_region(region, capacity);
                            cursor.adopt_offsets(&body.cursor);
                            cursor
                        })
                };
                match retained {
                    Some(cursor) => {
                        Some(self.activate(index, cursor, DataOrigin::External, BufFlags::EMPTY))
                    }
                    None => {
                        self.rollback(index);
                        None
                    }
                }
            }
            _ => {
                let clone = self.allocate(capacity, timeout)?;
                {
                    let src = sync::lock(&src_slot.body);
                    let mut dst = sync::lock(&clone.slot().body);
                    dst.cursor.copy_from(&src.cursor);
                }
                Some(clone)
            }
        }
    }
}

#[cfg(all(test, not(any(loom, spark_loom))))]
mod tests {
    use super::*;

    fn fixed_pool(count: u16, policy: AllocPolicy) -> Pool {
        Pool::new(
            PoolConfig::fixed(count, 8)
                .with_name("unit")
                .with_policy(policy),
        )
        .expect("构造缓冲池")
    }

    #[test]
    fn ring_cursor_counts_down_and_wraps() {
        let mut state = ClaimState {
            uninit_count: 3,
            free_count: 3,
        };
        let order: Vec<usize> = (0..7).map(|_| state.advance_ring(3)).collect();
        assert_eq!(order, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn fixed_slices_are_carved_from_one_region() {
        let pool = fixed_pool(3, AllocPolicy::ScanForFree);
        let lens: Vec<usize> = pool
            .inner
            .slots
            .iter()
            .map(|slot| {
                sync::lock(&slot.body)
                    .fixed_region
                    .as_ref()
                    .map_or(0, BytesMut::len)
            })
            .collect();
        assert_eq!(lens, [8, 8, 8]);
    }

    #[test]
    fn ring_policy_probes_one_lap_then_fails() {
        let pool = fixed_pool(2, AllocPolicy::RingLazyInit);
        let _a = pool.allocate_default(Timeout::NoWait).expect("第一次");
        let _b = pool.allocate_default(Timeout::NoWait).expect("第二次");
        assert!(pool.allocate_default(Timeout::NoWait).is_none());
        assert_eq!(pool.stats().free_count, None);
        assert_eq!(pool.stats().failed_acquisitions, 1);
    }

    #[test]
    fn scan_policy_fails_fast_on_zero_free_count() {
        let pool = fixed_pool(1, AllocPolicy::ScanForFree);
        let held = pool.allocate_default(Timeout::NoWait).expect("唯一槽位");
        assert_eq!(pool.stats().free_count, Some(0));
        assert!(pool.allocate_default(Timeout::NoWait).is_none());
        assert_eq!(pool.stats().free_count, Some(0), "失败路径不得改动可用计数");
        drop(held);
        assert_eq!(pool.stats().free_count, Some(1));
    }

    #[test]
    fn fixed_allocation_is_clamped_to_slice_size() {
        let pool = fixed_pool(1, AllocPolicy::ScanForFree);
        let mut buf = pool.allocate(64, Timeout::NoWait).expect("分配");
        assert_eq!(buf.cursor().capacity(), 8);
        drop(buf);
        let mut small = pool.allocate(3, Timeout::NoWait).expect("再次分配");
        assert_eq!(small.cursor().capacity(), 3);
        assert_eq!(small.cursor().headroom(), 0);
    }

    #[test]
    fn zero_sized_allocation_has_no_storage() {
        let pool = fixed_pool(1, AllocPolicy::ScanForFree);
        let mut buf = pool.allocate(0, Timeout::NoWait).expect("零尺寸分配");
        assert_eq!(buf.cursor().capacity(), 0);
        drop(buf);
        let mut again = pool.allocate_default(Timeout::NoWait).expect("固定切片仍在槽位中");
        assert_eq!(again.cursor().capacity(), 8);
    }
}
