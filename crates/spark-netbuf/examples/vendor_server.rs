//! 厂商模型服务端：解析 SET 消息，构造 STATUS 应答，经广播承载队列发出。
//!
//! 运行：`RUST_LOG=spark_netbuf=debug cargo run -p spark-netbuf --example vendor_server`

use std::{error::Error, thread};

use spark_netbuf::{
    AllocPolicy, BufFlags, NetBuf, NetBufQueue, Pool, PoolConfig, Release, SimpleBuf, Timeout,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 三字节厂商操作码：`0xC0 | 0x02`，后随小端公司标识。
const STATUS_OPCODE: u8 = 0xC2;
const COMPANY_ID: u16 = 0x05D6;
/// 接入层单包最大负载与传输层 MIC。
const MAX_ACCESS_PAYLOAD: usize = 11;
const TRANSMIC_LEN: usize = 4;
/// 应答中操作码与状态字节之后的填充长度。
const FILL_LEN: usize = 7;
/// 广播帧头：长度字节 + AD 类型。
const ADV_HEADROOM: usize = 2;
const AD_TYPE_MESH_MESSAGE: u8 = 0x2A;

/// 处理 SET：读出开关状态与序号，按约定构造 STATUS。
fn handle_set(incoming: &mut SimpleBuf) -> SimpleBuf {
    let onoff = incoming.pull_u8();
    let seq = incoming.pull_u8();

    let mut reply = SimpleBuf::with_capacity(MAX_ACCESS_PAYLOAD + TRANSMIC_LEN);
    reply.add_u8(STATUS_OPCODE);
    reply.add_le16(COMPANY_ID);
    reply.add_u8(onoff);
    reply.add_fill(seq.wrapping_add(1), FILL_LEN);
    reply
}

/// 把应答封装进广播帧：先写负载，再向头部压入 AD 结构。
fn frame_reply(pool: &Pool, reply: &SimpleBuf) -> Option<NetBuf> {
    let mut frame = pool.allocate_default(Timeout::NoWait)?;
    {
        let mut cursor = frame.cursor();
        cursor.reserve(ADV_HEADROOM);
        cursor.add_mem(reply.data());
        cursor.push_u8(AD_TYPE_MESH_MESSAGE);
        let ad_len = u8::try_from(reply.len() + 1).ok()?;
        cursor.push_u8(ad_len);
    }
    frame.user_data().fill(0);
    Some(frame)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vendor_server=info,spark_netbuf=debug")),
        )
        .init();

    let adv_pool = Pool::new(
        PoolConfig::fixed(6, 29)
            .with_name("adv")
            .with_user_data_size(4)
            .with_policy(AllocPolicy::RingLazyInit),
    )?;
    let bearer_queue = NetBufQueue::new();

    let mut incoming = SimpleBuf::with_capacity(MAX_ACCESS_PAYLOAD);
    incoming.add_u8(0x01);
    incoming.add_u8(0x10);
    let reply = handle_set(&mut incoming);
    info!(reply = ?reply.data(), "STATUS 已构造");

    let frame = frame_reply(&adv_pool, &reply).ok_or("adv 缓冲池耗尽")?;
    // 传输层保留一份引用用于重传，另一份交给承载层。
    let retransmit = frame.retain();
    frame.mark_busy(BufFlags::ADV_BUSY);
    bearer_queue.enqueue(frame);

    thread::scope(|scope| {
        scope.spawn(|| {
            while let Some(mut frame) = bearer_queue.dequeue() {
                info!(frame = ?frame.cursor().data(), "承载层发送");
                frame.clear_busy(BufFlags::ADV_BUSY);
                match frame.release_chain() {
                    Release::Shared => info!("传输层仍持有该帧"),
                    Release::Released => info!("帧已回收"),
                    Release::Deferred(held) => drop(held),
                }
            }
        });
    });

    let outcome = retransmit.release_chain();
    info!(released = matches!(outcome, Release::Released), stats = ?adv_pool.stats(), "发送结束");
    Ok(())
}
