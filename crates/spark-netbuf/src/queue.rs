//! 描述符队列。
//!
//! # 设计背景（Why）
//! - 发送路径把完整报文（头部 + 分片）交给承载层线程，接收方需要一次取出整条链；
//! - 队列节点不额外分配内存：链接直接保存在槽位上，与分片链互不干扰。
//!
//! # 逻辑解析（How）
//! - 入队时把分片链展开为队列链：非末尾节点置 `FRAGS`，末尾节点不置；
//! - 出队时沿 `FRAGS` 重建分片链并清除标记；
//! - 拼接与摘取都在一次临界区内完成，链的遍历与 `FRAGS` 标记在临界区外预先完成。
//!
//! # 契约说明（What）
//! - 入队即转移所有权：调用方交出的那一份引用由队列持有，出队时原样交还；
//! - 队列析构时释放剩余的所有描述符。

use tracing::trace;

use crate::{
    BufFlags, NetBuf,
    critical::Exclusive,
    pool::BufLink,
    sync,
};

const TARGET: &str = "spark_netbuf::queue";

#[derive(Default)]
struct LinkList {
    head: Option<BufLink>,
    tail: Option<BufLink>,
    nodes: usize,
}

impl LinkList {
    fn append(&mut self, head: BufLink, tail: BufLink, count: usize) {
        match self.tail.take() {
            Some(old_tail) => sync::lock(&old_tail.slot().links).queue_next = Some(head),
            None => self.head = Some(head),
        }
        self.tail = Some(tail);
        self.nodes += count;
    }

    fn pop_front(&mut self) -> Option<BufLink> {
        let head = self.head.take()?;
        self.head = sync::lock(&head.slot().links).queue_next.take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.nodes -= 1;
        Some(head)
    }
}

/// 保留分片结构的 FIFO 描述符队列。
pub struct NetBufQueue {
    list: Exclusive<LinkList>,
}

impl NetBufQueue {
    pub fn new() -> Self {
        Self {
            list: Exclusive::new(LinkList::default()),
        }
    }

    /// 把 `buf` 及其整条分片链追加到队尾。
    pub fn enqueue(&self, buf: NetBuf) {
        let head = buf.into_link();
        let mut tail = head.clone();
        let mut count = 1;
        loop {
            let next = {
                let mut links = sync::lock(&tail.slot().links);
                debug_assert!(links.queue_next.is_none(), "描述符已在队列中");
                let next = links.frag.take();
                links.queue_next = next.clone();
                next
            };
            match next {
                Some(next) => {
                    tail.slot().insert_flags(BufFlags::FRAGS);
                    tail = next;
                    count += 1;
                }
                None => break,
            }
        }
        trace!(target: TARGET, head = %head.id(), nodes = count, "链入队");
        self.list.lock().append(head, tail, count);
    }

    /// 取出队首的完整分片链；队列为空时返回 `None`。
    pub fn dequeue(&self) -> Option<NetBuf> {
        let head = {
            let mut list = self.list.lock();
            let head = list.pop_front()?;
            let mut current = head.clone();
            while current.slot().flags().contains(BufFlags::FRAGS) {
                let Some(next) = list.pop_front() else {
                    panic!("队列中的分片链在 {} 之后被截断", current.id());
                };
                current.slot().remove_flags(BufFlags::FRAGS);
                sync::lock(&current.slot().links).frag = Some(next.clone());
                current = next;
            }
            head
        };
        trace!(target: TARGET, head = %head.id(), "链出队");
        Some(NetBuf::from_link(head))
    }

    /// 队列中的描述符节点数（分片分别计数）。
    pub fn node_count(&self) -> usize {
        self.list.lock().nodes
    }

    pub fn is_empty(&self) -> bool {
        self.list.lock().head.is_none()
    }
}

impl Default for NetBufQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NetBufQueue {
    fn drop(&mut self) {
        while let Some(buf) = self.dequeue() {
            drop(buf);
        }
    }
}

/// 不感知分片的单描述符 FIFO。
pub struct SimpleQueue {
    list: Exclusive<LinkList>,
}

impl SimpleQueue {
    pub fn new() -> Self {
        Self {
            list: Exclusive::new(LinkList::default()),
        }
    }

    /// 追加单个描述符；挂有分片的描述符必须使用 [`NetBufQueue`]。
    pub fn put(&self, buf: NetBuf) {
        assert!(
            buf.frag_id().is_none(),
            "SimpleQueue 只接受不带分片的描述符 {}",
            buf.id()
        );
        let link = buf.into_link();
        self.list.lock().append(link.clone(), link, 1);
    }

    pub fn get(&self) -> Option<NetBuf> {
        let link = self.list.lock().pop_front()?;
        Some(NetBuf::from_link(link))
    }

    pub fn len(&self) -> usize {
        self.list.lock().nodes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SimpleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimpleQueue {
    fn drop(&mut self) {
        while let Some(buf) = self.get() {
            drop(buf);
        }
    }
}

#[cfg(all(test, not(any(loom, spark_loom))))]
mod tests {
    use super::*;
    use crate::{Pool, PoolConfig, Timeout};
    use alloc::vec::Vec;

    #[test]
    fn dropping_queue_releases_pending_chains() {
        let pool = Pool::new(PoolConfig::fixed(2, 4)).expect("构造缓冲池");
        let queue = NetBufQueue::new();
        let mut head = pool.allocate_default(Timeout::NoWait).expect("head");
        head.frag_add(pool.allocate_default(Timeout::NoWait).expect("frag"));
        queue.enqueue(head);
        assert_eq!(queue.node_count(), 2);
        assert_eq!(pool.stats().active, 2);
        drop(queue);
        assert_eq!(pool.stats().active, 0);
    }

    #[test]
    fn simple_queue_is_fifo() {
        let pool = Pool::new(PoolConfig::fixed(3, 4)).expect("构造缓冲池");
        let queue = SimpleQueue::new();
        let ids: Vec<_> = (0..3)
            .map(|_| {
                let buf = pool.allocate_default(Timeout::NoWait).expect("分配");
                let id = buf.id();
                queue.put(buf);
                id
            })
            .collect();
        let drained: Vec<_> = core::iter::from_fn(|| queue.get()).map(|buf| buf.id()).collect();
        assert_eq!(drained, ids);
        assert!(queue.is_empty());
    }
}
