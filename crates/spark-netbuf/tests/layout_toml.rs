//! `layout_toml` 集成测试：板级配置以 TOML 声明缓冲池布局。

use spark_netbuf::{AllocPolicy, Pool, PoolTable, Timeout};

const BOARD: &str = r#"
[[pool]]
name = "adv"
buf_count = 6
data_size = 29
user_data_size = 4

[[pool]]
name = "segment"
buf_count = 10
data_size = 12
policy = "ring_lazy_init"
"#;

#[test]
fn board_layout_builds_every_pool() {
    let table: PoolTable = toml::from_str(BOARD).expect("解析板级布局");
    assert_eq!(table.pools.len(), 2);
    assert_eq!(table.pools[0].policy, AllocPolicy::ScanForFree, "缺省策略");
    assert_eq!(table.pools[1].policy, AllocPolicy::RingLazyInit);

    let pools: Vec<Pool> = table
        .pools
        .into_iter()
        .map(|layout| Pool::new(layout.into_config()).expect("构造缓冲池"))
        .collect();
    assert_eq!(pools[0].name(), "adv");
    assert_eq!(pools[1].capacity(), 10);

    let mut buf = pools[0].allocate_default(Timeout::NoWait).expect("分配");
    assert_eq!(buf.cursor().capacity(), 29);
    assert_eq!(buf.user_data().len(), 4);
}

#[test]
fn unknown_fields_are_rejected() {
    let text = "[[pool]]\nname = \"adv\"\nbuf_count = 1\ndata_size = 8\nheap = true\n";
    assert!(toml::from_str::<PoolTable>(text).is_err());
}

#[cfg(feature = "layout-toml")]
#[test]
fn parse_errors_carry_stable_code() {
    let err = PoolTable::from_toml_str("[[pool]]\nname = 3\n").expect_err("类型不符");
    assert_eq!(err.code(), spark_netbuf::codes::LAYOUT_PARSE);
}
