mod common;

use anyhow::Result as AnyResult;
use asset_model::attribute::Freshness;
use asset_model::capability::{Closable, Reactivatable, asset_state};
use asset_model::config::SessionConfig;
use asset_model::error::DomainError;
use asset_model::remote::inmemory::RemoteCall;
use asset_model::value::AttributeValue;
use chrono::Utc;
use common::{CHANGE_DATE, ESTIMATE, NAME, Story, fixture, fixture_with};

#[test]
fn missing_required_attributes_fail_locally() -> AnyResult<()> {
    let fx = fixture()?;
    let story = fx.session.create::<Story>()?;
    story.set(&ESTIMATE, 2.0)?;
    assert_eq!(story.invalid_attributes()?, vec!["Name".to_string()]);

    match story.commit(None) {
        Err(DomainError::ValidationFailure { attributes }) => {
            assert_eq!(attributes, vec!["Name".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(fx.store.calls().is_empty());
    assert!(story.is_new());
    Ok(())
}

#[test]
fn stable_entities_validate_only_pending_required_attributes() -> AnyResult<()> {
    let fx = fixture()?;
    let oid = fx.store.seed("Story", [("Name", "kept".into())])?;
    let story = fx.session.get::<Story>(&oid)?.expect("story exists");
    story.invalidate_all();

    story.set(&ESTIMATE, 5.0)?;
    assert!(story.invalid_attributes()?.is_empty());

    story.set_null(&NAME)?;
    assert_eq!(story.invalid_attributes()?, vec!["Name".to_string()]);
    Ok(())
}

#[test]
fn disabled_validation_defers_to_the_store() -> AnyResult<()> {
    let config = SessionConfig::builder().validation_enabled(false).build();
    let fx = fixture_with(config)?;
    let story = fx.session.create::<Story>()?;

    assert!(matches!(
        story.commit(None),
        Err(DomainError::DataViolation { .. })
    ));
    assert_eq!(fx.store.calls().len(), 1);
    Ok(())
}

#[test]
fn rejected_commit_keeps_pending_edits() -> AnyResult<()> {
    let fx = fixture()?;
    let story = fx.session.create::<Story>()?;
    story.set(&NAME, "retry me".to_string())?;
    let ephemeral = story.oid();

    fx.store.reject_saves(Some("security policy".to_string()));
    assert!(matches!(
        story.commit(Some("first try")),
        Err(DomainError::DataViolation { .. })
    ));
    assert_eq!(story.oid(), ephemeral);
    assert!(story.is_dirty());
    assert_eq!(story.get(&NAME)?, Some("retry me".to_string()));

    fx.store.reject_saves(None);
    let stable = story.commit(Some("second try"))?;
    assert!(stable.is_stable());
    assert!(matches!(
        fx.store.calls().last(),
        Some(RemoteCall::Save { comment: Some(comment), .. }) if comment == "second try"
    ));
    Ok(())
}

#[test]
fn clean_stable_commit_is_local() -> AnyResult<()> {
    let fx = fixture()?;
    let oid = fx.store.seed("Story", [("Name", "idle".into())])?;
    let story = fx.session.get::<Story>(&oid)?.expect("story exists");
    fx.store.clear_calls();

    assert_eq!(story.commit(None)?, oid);
    assert!(fx.store.calls().is_empty());
    Ok(())
}

#[test]
fn writes_are_checked_against_the_meta_model() -> AnyResult<()> {
    let fx = fixture()?;
    let story = fx.session.create::<Story>()?;

    assert!(matches!(
        story.set(&CHANGE_DATE, Utc::now()),
        Err(DomainError::ReadOnlyViolation { .. })
    ));
    assert!(matches!(
        story.set_value("Estimate", AttributeValue::Text("big".to_string())),
        Err(DomainError::TypeMismatch { .. })
    ));
    assert!(matches!(
        story.set_value("Nope", AttributeValue::Null),
        Err(DomainError::UnknownAttribute { .. })
    ));
    assert!(matches!(
        story.set_value("Owners.@Count", AttributeValue::Integer(3)),
        Err(DomainError::ReadOnlyViolation { .. })
    ));
    assert!(!story.is_dirty());
    Ok(())
}

#[test]
fn close_and_reactivate() -> AnyResult<()> {
    let fx = fixture()?;
    let oid = fx.store.seed("Story", [("Name", "lifecycle".into())])?;
    let story = fx.session.get::<Story>(&oid)?.expect("story exists");

    assert!(!story.is_closed()?);
    assert!(story.can_close()?);
    assert!(!story.can_reactivate()?);

    story.close()?;
    assert!(story.is_closed()?);
    assert!(!story.can_close()?);
    assert!(story.can_reactivate()?);
    assert!(matches!(
        story.close(),
        Err(DomainError::InvalidOperation { .. })
    ));

    story.reactivate()?;
    assert!(!story.is_closed()?);
    Ok(())
}

#[test]
fn lifecycle_operations_refresh_the_cached_state() -> AnyResult<()> {
    let fx = fixture()?;
    let oid = fx.store.seed("Story", [("Name", "cached state".into())])?;
    let story = fx.session.get::<Story>(&oid)?.expect("story exists");

    assert_eq!(
        story.get_value("AssetState", Freshness::Cachable)?,
        AttributeValue::Integer(asset_state::ACTIVE)
    );

    story.close()?;

    // 乐观解析走缓存读取，状态已失效，必须重新取回
    fx.store.clear_calls();
    let resolved = fx.session.resolve(&oid, false)?;
    assert!(resolved.is_some_and(|registration| registration.is::<Story>()));
    assert!(fx.store.calls().iter().any(|call| matches!(
        call,
        RemoteCall::RetrieveAttribute { attribute, .. } if attribute == "AssetState"
    )));

    fx.store.clear_calls();
    assert_eq!(
        story.get_value("AssetState", Freshness::Cachable)?,
        AttributeValue::Integer(asset_state::CLOSED)
    );
    assert!(fx.store.calls().is_empty());

    story.reactivate()?;
    assert_eq!(
        story.get_value("AssetState", Freshness::Cachable)?,
        AttributeValue::Integer(asset_state::ACTIVE)
    );
    Ok(())
}

#[test]
fn operations_need_a_committed_entity() -> AnyResult<()> {
    let fx = fixture()?;
    let story = fx.session.create::<Story>()?;
    assert!(matches!(
        story.execute_operation("Inactivate"),
        Err(DomainError::InvalidOperation { .. })
    ));
    assert!(!story.can_execute("Inactivate")?);

    story.set(&NAME, "now real".to_string())?;
    story.commit(None)?;
    assert!(matches!(
        story.execute_operation("Archive"),
        Err(DomainError::InvalidOperation { .. })
    ));
    assert!(story.can_execute("Delete")?);

    let oid = story.execute_operation("Delete")?;
    assert!(fx.store.record(&oid).is_none());
    fx.session.invalidate(&oid, None);
    assert!(fx.session.get::<Story>(&oid)?.is_none());
    Ok(())
}
