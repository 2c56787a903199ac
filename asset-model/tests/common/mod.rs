#![allow(dead_code)]

use asset_model::asset::Asset;
use asset_model::attribute::Property;
use asset_model::capability::{Attachable, Closable, Reactivatable};
use asset_model::config::SessionConfig;
use asset_model::error::DomainResult;
use asset_model::rank::{RankValue, Ranked};
use asset_model::registry::TypeRegistry;
use asset_model::remote::inmemory::InMemoryAssetStore;
use asset_model::schema::{
    AssetTypeDescriptor, AttributeDefinition, OperationDescriptor, StaticMetaModel,
};
use asset_model::session::Session;
use asset_model::value::ValueKind;
use asset_model_macros::asset_kind;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const NAME: Property<String> = Property::cachable("Name");
pub const ESTIMATE: Property<f64> = Property::cachable("Estimate");
pub const STATE: Property<i64> = Property::non_cachable("AssetState");
pub const ORDER: Property<RankValue> = Property::non_cachable("Order");
pub const CHANGE_DATE: Property<DateTime<Utc>> = Property::non_cachable("ChangeDate");

#[asset_kind(asset_type = "Story", select = ["Name"], order = "Order")]
pub struct Story(Asset);

#[asset_kind(asset_type = "Story", discriminant = 200, select = ["Name"])]
pub struct StoryTemplate(Asset);

#[asset_kind(asset_type = "Member", select = ["Name"])]
pub struct Member(Asset);

#[asset_kind(asset_type = "Attachment")]
pub struct Attachment(Asset);

impl Closable for Story {}
impl Reactivatable for Story {}
impl Ranked for Story {}

impl Attachable for Story {
    type Attachment = Attachment;
}

fn text(name: &str) -> AttributeDefinition {
    AttributeDefinition::builder()
        .name(name)
        .kind(ValueKind::Text)
        .build()
}

fn required_text(name: &str) -> AttributeDefinition {
    AttributeDefinition::builder()
        .name(name)
        .kind(ValueKind::Text)
        .required(true)
        .build()
}

fn relations(name: &str, related: &str) -> AttributeDefinition {
    AttributeDefinition::builder()
        .name(name)
        .kind(ValueKind::Relation)
        .multi_value(true)
        .related_type(related)
        .build()
}

pub fn meta_model() -> StaticMetaModel {
    let story = AssetTypeDescriptor::new("Story")
        .with_attribute(required_text("Name"))
        .with_attribute(text("Description"))
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
                .name("ChangeDate")
                .kind(ValueKind::Date)
                .read_only(true)
                .build(),
        )
        .with_attribute(relations("Owners", "Member"))
        .with_attribute(relations("Attachments", "Attachment"))
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
        )
        .with_operation(OperationDescriptor::builder().name("Delete").build());

    let member = AssetTypeDescriptor::new("Member")
        .with_attribute(required_text("Name"))
        .with_attribute(
            AttributeDefinition::builder()
                .name("OwnedWorkitems")
                .kind(ValueKind::Relation)
                .multi_value(true)
                .read_only(true)
                .related_type("Story")
                .build(),
        );

    let attachment = AssetTypeDescriptor::new("Attachment").with_attribute(required_text("Name"));

    StaticMetaModel::new()
        .with_type(story)
        .with_type(member)
        .with_type(attachment)
}

pub fn registry() -> DomainResult<TypeRegistry> {
    TypeRegistry::new()
        .with::<Story>()?
        .with::<StoryTemplate>()?
        .with::<Member>()?
        .with::<Attachment>()
}

pub struct Fixture {
    pub store: Arc<InMemoryAssetStore>,
    pub session: Session,
}

pub fn fixture() -> DomainResult<Fixture> {
    fixture_with(SessionConfig::default())
}

pub fn fixture_with(config: SessionConfig) -> DomainResult<Fixture> {
    init_tracing();
    let store = Arc::new(InMemoryAssetStore::new(meta_model()));
    let session = Session::with_store(store.clone(), registry()?, config);
    Ok(Fixture { store, session })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
