use core::fmt;

use bytes::BytesMut;

/// `SimpleBuf` 是定长连续字节区上的读写游标，头部与尾部可独立伸缩。
///
/// # 设计背景（Why）
/// - 协议栈自下而上解析时从头部剥离字段（`pull`），自上而下封装时在头部追加报头（`push`），
///   负载本身则从尾部写入（`add`）；三类操作必须在同一块内存上完成，不做任何拷贝。
/// - 数据区大小在分配时即确定，之后不会扩容，越界属于调用方的编程错误。
///
/// # 逻辑解析（How）
/// - `region` 持有完整的底层字节（`BytesMut`，长度不小于 `capacity`）；
/// - `start` 为当前数据起点相对区首的偏移，`len` 为当前数据长度；
/// - `headroom = start`、`tailroom = capacity - start - len` 均为派生量，从不单独存储。
///
/// # 契约说明（What）
/// - **不变量**：任意时刻 `headroom() + len() + tailroom() == capacity()`；
/// - **前置条件**：`add(n)` 要求 `n <= tailroom()`，`push(n)` 要求 `n <= headroom()`，
///   `pull(n)` 要求 `n <= len()`，`reserve(n)` 要求 `len() == 0`；违背即 panic；
/// - 多字节类型辅助方法在写入时立即完成字节序转换，读取时立即还原，不假设任何内存对齐。
pub struct SimpleBuf {
    region: BytesMut,
    capacity: usize,
    start: usize,
    len: usize,
}

impl SimpleBuf {
    /// 独立构造一个给定容量的游标，数据区清零。
    ///
    /// 适用于栈上组装的短消息（例如模型层应答），不经过任何缓冲池。
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_region(BytesMut::zeroed(capacity), capacity)
    }

    /// 包装已有数据区，`capacity` 不得超过区长度。
    pub(crate) fn from_region(region: BytesMut, capacity: usize) -> Self {
        assert!(
            capacity <= region.len(),
            "数据区长度 {} 小于声明容量 {capacity}",
            region.len()
        );
        Self {
            region,
            capacity,
            start: 0,
            len: 0,
        }
    }

    /// 没有数据区的游标（零尺寸分配或已释放的描述符）。
    pub(crate) fn detached() -> Self {
        Self {
            region: BytesMut::new(),
            capacity: 0,
            start: 0,
            len: 0,
        }
    }

    /// 交还底层数据区。
    pub(crate) fn into_region(self) -> BytesMut {
        self.region
    }

    pub(crate) fn region(&self) -> &BytesMut {
        &self.region
    }

    /// 数据区总容量。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前数据长度。
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 数据起点之前的空闲字节数。
    pub fn headroom(&self) -> usize {
        self.start
    }

    /// 数据末尾之后的空闲字节数。
    pub fn tailroom(&self) -> usize {
        self.capacity - self.start - self.len
    }

    /// 当前数据视图。
    pub fn data(&self) -> &[u8] {
        &self.region[self.start..self.start + self.len]
    }

    /// 当前数据的可变视图。
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.region[self.start..self.start + self.len]
    }

    /// 清空数据并取消预留头部空间。
    pub fn reset(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    /// 在写入任何数据之前预留 `reserve` 字节头部空间。
    pub fn reserve(&mut self, reserve: usize) {
        assert!(self.len == 0, "reserve 只能在空缓冲上调用，当前长度 {}", self.len);
        assert!(
            reserve <= self.capacity,
            "预留 {reserve} 字节超过容量 {}",
            self.capacity
        );
        self.start = reserve;
    }

    /// 在尾部扩展 `len` 字节并返回新暴露的区域。
    pub fn add(&mut self, len: usize) -> &mut [u8] {
        assert!(
            len <= self.tailroom(),
            "add 越界：请求 {len} 字节，尾部剩余 {}",
            self.tailroom()
        );
        let tail = self.start + self.len;
        self.len += len;
        &mut self.region[tail..tail + len]
    }

    /// 在尾部追加一段字节。
    pub fn add_mem(&mut self, mem: &[u8]) -> &mut [u8] {
        let dst = self.add(mem.len());
        dst.copy_from_slice(mem);
        dst
    }

    /// 在尾部追加 `len` 个 `value`。
    pub fn add_fill(&mut self, value: u8, len: usize) -> &mut [u8] {
        let dst = self.add(len);
        dst.fill(value);
        dst
    }

    pub fn add_u8(&mut self, value: u8) {
        self.add(1)[0] = value;
    }

    pub fn add_le16(&mut self, value: u16) {
        self.add_mem(&value.to_le_bytes());
    }

    pub fn add_be16(&mut self, value: u16) {
        self.add_mem(&value.to_be_bytes());
    }

    pub fn add_le32(&mut self, value: u32) {
        self.add_mem(&value.to_le_bytes());
    }

    pub fn add_be32(&mut self, value: u32) {
        self.add_mem(&value.to_be_bytes());
    }

    /// 在头部扩展 `len` 字节，数据起点前移，返回新的头部区域。
    pub fn push(&mut self, len: usize) -> &mut [u8] {
        assert!(
            len <= self.headroom(),
            "push 越界：请求 {len} 字节，头部剩余 {}",
            self.headroom()
        );
        self.start -= len;
        self.len += len;
        &mut self.region[self.start..self.start + len]
    }

    /// 在头部插入一段字节。
    pub fn push_mem(&mut self, mem: &[u8]) -> &mut [u8] {
        let dst = self.push(mem.len());
        dst.copy_from_slice(mem);
        dst
    }

    pub fn push_u8(&mut self, value: u8) {
        self.push(1)[0] = value;
    }

    pub fn push_le16(&mut self, value: u16) {
        self.push_mem(&value.to_le_bytes());
    }

    pub fn push_be16(&mut self, value: u16) {
        self.push_mem(&value.to_be_bytes());
    }

    pub fn push_le32(&mut self, value: u32) {
        self.push_mem(&value.to_le_bytes());
    }

    pub fn push_be32(&mut self, value: u32) {
        self.push_mem(&value.to_be_bytes());
    }

    /// 从头部剥离 `len` 字节，返回被剥离的内容。
    ///
    /// 返回的切片仍指向原数据区，直到下一次 `push` 覆盖它之前内容保持不变。
    pub fn pull(&mut self, len: usize) -> &[u8] {
        assert!(
            len <= self.len,
            "pull 越界：请求 {len} 字节，当前长度 {}",
            self.len
        );
        let head = self.start;
        self.start += len;
        self.len -= len;
        &self.region[head..head + len]
    }

    /// 从头部剥离 `dst.len()` 字节并拷贝到 `dst`。
    pub fn pull_mem(&mut self, dst: &mut [u8]) {
        let src = self.pull(dst.len());
        dst.copy_from_slice(src);
    }

    fn pull_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        self.pull_mem(&mut out);
        out
    }

    pub fn pull_u8(&mut self) -> u8 {
        self.pull(1)[0]
    }

    pub fn pull_le16(&mut self) -> u16 {
        u16::from_le_bytes(self.pull_array())
    }

    pub fn pull_be16(&mut self) -> u16 {
        u16::from_be_bytes(self.pull_array())
    }

    pub fn pull_le32(&mut self) -> u32 {
        u32::from_le_bytes(self.pull_array())
    }

    pub fn pull_be32(&mut self) -> u32 {
        u32::from_be_bytes(self.pull_array())
    }

    /// 复制另一游标的偏移与内容，供克隆描述符使用。
    pub(crate) fn copy_from(&mut self, other: &SimpleBuf) {
        assert!(
            other.start + other.len <= self.capacity,
            "克隆目标容量 {} 不足以容纳源数据 {}",
            self.capacity,
            other.start + other.len
        );
        self.start = other.start;
        self.len = other.len;
        self.data_mut().copy_from_slice(other.data());
    }

    /// 在新数据区上恢复另一游标的偏移，内容由数据区本身提供。
    pub(crate) fn adopt_offsets(&mut self, other: &SimpleBuf) {
        assert!(
            other.start + other.len <= self.capacity,
            "数据区容量 {} 不足以承载偏移 {}",
            self.capacity,
            other.start + other.len
        );
        self.start = other.start;
        self.len = other.len;
    }
}

impl fmt::Debug for SimpleBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleBuf")
            .field("capacity", &self.capacity)
            .field("headroom", &self.headroom())
            .field("len", &self.len)
            .field("tailroom", &self.tailroom())
            .finish()
    }
}
