//! `SimpleBuf` 性质验证。
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：游标是所有编解码路径的基础，`headroom + len + tailroom == capacity`
//!   一旦失守，后续任何 `push`/`pull` 都会读写错误的字节。
//! - **设计手法 (How)**：以 `VecDeque` 影子模型对照随机操作序列；越界操作在模型层过滤，
//!   越界断言本身由单元测试覆盖。
//! - **合同 (What)**：每一步之后，游标的数据视图、头部空间与模型一致，且容量守恒。

use std::collections::VecDeque;

use proptest::prelude::*;
use spark_netbuf::SimpleBuf;

#[derive(Clone, Debug)]
enum Op {
    Reserve(usize),
    Add(Vec<u8>),
    Push(Vec<u8>),
    Pull(usize),
    AddBe16(u16),
    PushLe32(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..24).prop_map(Op::Reserve),
        prop::collection::vec(any::<u8>(), 0..12).prop_map(Op::Add),
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Op::Push),
        (0usize..10).prop_map(Op::Pull),
        any::<u16>().prop_map(Op::AddBe16),
        any::<u32>().prop_map(Op::PushLe32),
    ]
}

/// 影子模型：头部空间 + 数据字节。
struct Model {
    capacity: usize,
    headroom: usize,
    data: VecDeque<u8>,
}

impl Model {
    fn tailroom(&self) -> usize {
        self.capacity - self.headroom - self.data.len()
    }

    fn prepend(&mut self, bytes: &[u8]) {
        self.headroom -= bytes.len();
        for byte in bytes.iter().rev() {
            self.data.push_front(*byte);
        }
    }
}

/// 对游标与模型同时执行一步；越界操作被跳过。
fn step(buf: &mut SimpleBuf, model: &mut Model, op: &Op) -> Result<(), TestCaseError> {
    match op {
        Op::Reserve(n) if model.data.is_empty() && *n <= model.capacity => {
            buf.reserve(*n);
            model.headroom = *n;
        }
        Op::Add(bytes) if bytes.len() <= model.tailroom() => {
            buf.add_mem(bytes);
            model.data.extend(bytes.iter().copied());
        }
        Op::Push(bytes) if bytes.len() <= model.headroom => {
            buf.push_mem(bytes);
            model.prepend(bytes);
        }
        Op::Pull(n) if *n <= model.data.len() => {
            let pulled = buf.pull(*n).to_vec();
            let expected: Vec<u8> = model.data.drain(..*n).collect();
            model.headroom += *n;
            prop_assert_eq!(pulled, expected);
        }
        Op::AddBe16(value) if model.tailroom() >= 2 => {
            buf.add_be16(*value);
            model.data.extend(value.to_be_bytes());
        }
        Op::PushLe32(value) if model.headroom >= 4 => {
            buf.push_le32(*value);
            model.prepend(&value.to_le_bytes());
        }
        _ => {}
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_cursor_matches_shadow_model(
        capacity in 0usize..48,
        ops in prop::collection::vec(op(), 0..64),
    ) {
        let mut buf = SimpleBuf::with_capacity(capacity);
        let mut model = Model { capacity, headroom: 0, data: VecDeque::new() };
        for op in &ops {
            step(&mut buf, &mut model, op)?;
            prop_assert_eq!(buf.headroom() + buf.len() + buf.tailroom(), buf.capacity());
            prop_assert_eq!(buf.headroom(), model.headroom);
            let expected = model.data.iter().copied().collect::<Vec<_>>();
            prop_assert_eq!(buf.data(), expected.as_slice());
        }
    }

    #[test]
    fn prop_typed_fields_decode_in_write_order(
        a in any::<u8>(),
        b in any::<u16>(),
        c in any::<u16>(),
        d in any::<u32>(),
        e in any::<u32>(),
    ) {
        let mut buf = SimpleBuf::with_capacity(13);
        buf.add_u8(a);
        buf.add_le16(b);
        buf.add_be16(c);
        buf.add_le32(d);
        buf.add_be32(e);
        prop_assert_eq!(buf.tailroom(), 0);
        prop_assert_eq!(&buf.data()[1..3], &b.to_le_bytes()[..]);
        prop_assert_eq!(&buf.data()[3..5], &c.to_be_bytes()[..]);

        prop_assert_eq!(buf.pull_u8(), a);
        prop_assert_eq!(buf.pull_le16(), b);
        prop_assert_eq!(buf.pull_be16(), c);
        prop_assert_eq!(buf.pull_le32(), d);
        prop_assert_eq!(buf.pull_be32(), e);
        prop_assert!(buf.is_empty());
        prop_assert_eq!(buf.headroom(), 13);
    }

    #[test]
    fn prop_headers_pushed_in_reverse_read_back_in_order(
        payload in prop::collection::vec(any::<u8>(), 0..16),
        opcode in any::<u16>(),
        ttl in any::<u8>(),
    ) {
        let mut buf = SimpleBuf::with_capacity(3 + payload.len());
        buf.reserve(3);
        buf.add_mem(&payload);
        buf.push_be16(opcode);
        buf.push_u8(ttl);
        prop_assert_eq!(buf.headroom(), 0);
        prop_assert_eq!(buf.pull_u8(), ttl);
        prop_assert_eq!(buf.pull_be16(), opcode);
        prop_assert_eq!(buf.data(), payload.as_slice());
    }
}
