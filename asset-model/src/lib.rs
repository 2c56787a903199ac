//! 远端资产的类型化对象模型
//!
//! 远端资产存储由元模型描述（资产类型、属性、操作），本 crate 在其上提供：
//! - 标识（`Oid`）：稳定标识与提交前的临时标识；
//! - 会话级记录缓存：同一标识恰好一个属性容器，所有句柄共享；
//! - 两级新鲜度的属性读取与暂存写入；
//! - 按判别值把记录解析为具体的 Rust 类型；
//! - 关系集合、排名与提交/操作。
//!
//! 线协议、元模型发现与查询过滤树的构造不在范围内，
//! 由实现 `MetaModel` / `QueryService` / `CommandService` 的协作者提供。
//!
pub mod asset;
pub mod attribute;
pub mod cache;
pub mod capability;
mod commit;
pub mod config;
pub mod container;
pub mod error;
pub mod oid;
pub mod rank;
pub mod registry;
pub mod relation;
pub mod remote;
mod resolve;
pub mod schema;
pub mod session;
pub mod value;

// 允许在本 crate 内部通过 ::asset_model 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::asset_model 路径。
extern crate self as asset_model;
