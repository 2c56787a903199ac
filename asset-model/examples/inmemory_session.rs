/// 进程内会话示例
/// 演示基于 InMemoryAssetStore 的创建、提交、读取、关系与排名
use asset_model::asset::Asset;
use asset_model::attribute::{Freshness, Property};
use asset_model::capability::{Closable, Reactivatable};
use asset_model::config::SessionConfig;
use asset_model::rank::Ranked;
use asset_model::registry::TypeRegistry;
use asset_model::remote::inmemory::InMemoryAssetStore;
use asset_model::schema::{
    AssetTypeDescriptor, AttributeDefinition, OperationDescriptor, StaticMetaModel,
};
use asset_model::session::Session;
use asset_model::value::ValueKind;
use asset_model_macros::asset_kind;
use std::sync::Arc;

// ============================================================================
// 实体类型
// ============================================================================

const NAME: Property<String> = Property::cachable("Name");
const ESTIMATE: Property<f64> = Property::cachable("Estimate");

#[asset_kind(asset_type = "Story", select = ["Name"], order = "Order")]
struct Story(Asset);

#[asset_kind(asset_type = "Member", select = ["Name"])]
struct Member(Asset);

impl Closable for Story {}
impl Reactivatable for Story {}
impl Ranked for Story {}

// ============================================================================
// 元模型
// ============================================================================

fn meta_model() -> StaticMetaModel {
    let name = || {
        AttributeDefinition::builder()
            .name("Name")
            .kind(ValueKind::Text)
            .required(true)
            .build()
    };

    let story = AssetTypeDescriptor::new("Story")
        .with_attribute(name())
        .with_attribute(
            AttributeDefinition::builder()
                .name("Estimate")
                .kind(ValueKind::Decimal)
                .build(),
        )
        .with_attribute(
            AttributeDefinition::builder()
                .name("AssetState")
                .kind(ValueKind::Integer)
                .build(),
        )
        .with_attribute(
            AttributeDefinition::builder()
                .name("Order")
                .kind(ValueKind::Rank)
                .build(),
        )
        .with_attribute(
            AttributeDefinition::builder()
                .name("Owners")
                .kind(ValueKind::Relation)
                .multi_value(true)
                .related_type("Member")
                .build(),
        )
        .with_operation(
            OperationDescriptor::builder()
                .name("Inactivate")
                .validator("CheckInactivate")
                .build(),
        )
        .with_operation(
            OperationDescriptor::builder()
                .name("Reactivate")
                .validator("CheckReactivate")
                .build(),
        );

    let member = AssetTypeDescriptor::new("Member").with_attribute(name());

    StaticMetaModel::new().with_type(story).with_type(member)
}

fn main() -> anyhow::Result<()> {
    println!("=== 进程内会话示例 ===\n");

    let store = Arc::new(InMemoryAssetStore::new(meta_model()));
    let registry = TypeRegistry::new().with::<Story>()?.with::<Member>()?;
    let session = Session::with_store(store.clone(), registry, SessionConfig::default());

    // 创建并提交：临时标识在提交后变为稳定标识
    let story = session.create::<Story>()?;
    story.set(&NAME, "Checkout flow".to_string())?;
    story.set(&ESTIMATE, 3.0)?;
    println!("创建: {}", story.oid());
    let oid = story.commit(Some("initial import"))?;
    println!("✅ 提交: {oid}");

    // 同一标识的句柄共享同一个容器
    let again = session.get::<Story>(&oid)?.ok_or_else(|| anyhow::anyhow!("{oid} missing"))?;
    println!("读取: name={:?} estimate={:?}", again.get(&NAME)?, again.get(&ESTIMATE)?);

    // 关系：读取名带类型过滤，写入走基础关系
    let member_oid = store.seed("Member", [("Name", "alice".into())])?;
    let member = session
        .get::<Member>(&member_oid)?
        .ok_or_else(|| anyhow::anyhow!("{member_oid} missing"))?;
    let owners = story.relation_with::<Member>("Owners:Member", "Owners");
    owners.add(&member)?;
    println!("✅ 负责人数量: {}", owners.count()?);

    // 排名
    let second = session.create::<Story>()?;
    second.set(&NAME, "Payment retries".to_string())?;
    second.commit(None)?;
    second.rank().set_above(&story)?;
    println!(
        "排名: {} 在 {} 之上 = {}",
        second.oid(),
        story.oid(),
        second.rank().is_above(&story)?
    );

    // 生命周期操作
    story.close()?;
    println!(
        "关闭后状态: {:?}",
        story.get_value("AssetState", Freshness::Cachable)?
    );
    story.reactivate()?;
    println!("重新激活: closed = {}", story.is_closed()?);

    println!("\n远端调用次数: {}", store.calls().len());
    Ok(())
}
