mod common;

use anyhow::Result as AnyResult;
use asset_model::capability::Attachable;
use asset_model::error::DomainError;
use asset_model::remote::AttributeChange;
use asset_model::remote::inmemory::RemoteCall;
use asset_model::value::AttributeValue;
use common::{Attachment, Member, NAME, Story, fixture};

fn saved_changes(calls: &[RemoteCall]) -> Vec<AttributeChange> {
    calls
        .iter()
        .filter_map(|call| match call {
            RemoteCall::Save { changes, .. } => Some(changes.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

#[test]
fn relation_round_trip_writes_through_the_base_name() -> AnyResult<()> {
    let fx = fixture()?;
    let story_oid = fx.store.seed("Story", [("Name", "owned".into())])?;
    let member_oid = fx.store.seed("Member", [("Name", "dev".into())])?;
    let story = fx.session.get::<Story>(&story_oid)?.expect("story exists");
    let member = fx.session.get::<Member>(&member_oid)?.expect("member exists");

    let owners = story.relation_with::<Member>("Owners:Member", "Owners");
    fx.store.clear_calls();
    owners.add(&member)?;

    let changes = saved_changes(&fx.store.calls());
    assert_eq!(
        changes,
        vec![AttributeChange::Add {
            attribute: "Owners".to_string(),
            item: member_oid.clone(),
        }]
    );
    assert!(!story.is_dirty());
    assert!(owners.contains(&member)?);
    assert_eq!(owners.count()?, 1);
    assert_eq!(owners.to_vec()?, vec![member.clone()]);

    fx.store.clear_calls();
    owners.remove(&member)?;
    let changes = saved_changes(&fx.store.calls());
    assert!(changes.iter().all(|change| change.attribute() == "Owners"));
    assert!(!owners.contains(&member)?);
    assert_eq!(owners.count()?, 0);
    Ok(())
}

#[test]
fn redundant_mutations_still_commit() -> AnyResult<()> {
    let fx = fixture()?;
    let member_oid = fx.store.seed("Member", [("Name", "dev".into())])?;
    let story_oid = fx.store.seed(
        "Story",
        [
            ("Name", "owned".into()),
            ("Owners", AttributeValue::Relations(vec![member_oid.clone()])),
        ],
    )?;
    let story = fx.session.get::<Story>(&story_oid)?.expect("story exists");
    let member = fx.session.get::<Member>(&member_oid)?.expect("member exists");
    let owners = story.relation::<Member>("Owners");

    fx.store.clear_calls();
    owners.add(&member)?;
    let saves = fx
        .store
        .calls()
        .iter()
        .filter(|call| matches!(call, RemoteCall::Save { .. }))
        .count();
    assert_eq!(saves, 1);
    assert_eq!(owners.count()?, 1);
    Ok(())
}

#[test]
fn clear_removes_every_member() -> AnyResult<()> {
    let fx = fixture()?;
    let a = fx.store.seed("Member", [("Name", "a".into())])?;
    let b = fx.store.seed("Member", [("Name", "b".into())])?;
    let story_oid = fx.store.seed(
        "Story",
        [
            ("Name", "crowded".into()),
            ("Owners", AttributeValue::Relations(vec![a.clone(), b.clone()])),
        ],
    )?;
    let story = fx.session.get::<Story>(&story_oid)?.expect("story exists");
    let owners = story.relation::<Member>("Owners");
    assert_eq!(owners.count()?, 2);

    owners.clear()?;
    assert_eq!(owners.count()?, 0);
    assert!(owners.to_vec()?.is_empty());
    Ok(())
}

#[test]
fn clear_through_a_filtered_view_writes_the_base_name() -> AnyResult<()> {
    let fx = fixture()?;
    let a = fx.store.seed("Member", [("Name", "a".into())])?;
    let b = fx.store.seed("Member", [("Name", "b".into())])?;
    let story_oid = fx.store.seed(
        "Story",
        [
            ("Name", "filtered".into()),
            ("Owners", AttributeValue::Relations(vec![a.clone(), b.clone()])),
        ],
    )?;
    let story = fx.session.get::<Story>(&story_oid)?.expect("story exists");
    let owners = story.relation_with::<Member>("Owners:Member", "Owners");
    assert_eq!(owners.count()?, 2);

    fx.store.clear_calls();
    owners.clear()?;

    let changes = saved_changes(&fx.store.calls());
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|change| change.attribute() == "Owners"));
    assert!(
        changes
            .iter()
            .all(|change| matches!(change, AttributeChange::Remove { .. }))
    );
    assert_eq!(owners.count()?, 0);
    Ok(())
}

#[test]
fn read_only_relations_fail_fast() -> AnyResult<()> {
    let fx = fixture()?;
    let member_oid = fx.store.seed("Member", [("Name", "dev".into())])?;
    let story_oid = fx.store.seed("Story", [("Name", "s".into())])?;
    let member = fx.session.get::<Member>(&member_oid)?.expect("member exists");
    let story = fx.session.get::<Story>(&story_oid)?.expect("story exists");

    let owned = member.relation::<Story>("OwnedWorkitems");
    assert!(owned.is_read_only()?);
    fx.store.clear_calls();
    assert!(matches!(
        owned.add(&story),
        Err(DomainError::ReadOnlyViolation { .. })
    ));
    assert!(!member.is_dirty());
    assert!(fx.store.calls().is_empty());

    let forced = story.relation::<Member>("Owners").read_only();
    assert!(forced.is_read_only()?);
    assert!(matches!(
        forced.add(&member),
        Err(DomainError::ReadOnlyViolation { .. })
    ));
    Ok(())
}

#[test]
fn ephemeral_owner_commits_with_the_relation() -> AnyResult<()> {
    let fx = fixture()?;
    let member_oid = fx.store.seed("Member", [("Name", "dev".into())])?;
    let member = fx.session.get::<Member>(&member_oid)?.expect("member exists");

    let story = fx.session.create::<Story>()?;
    story.set(&NAME, "born with owners".to_string())?;
    story.relation::<Member>("Owners").add(&member)?;

    assert!(!story.is_new());
    assert_eq!(
        fx.store.record(&story.oid()).and_then(|r| r.get("Owners").cloned()),
        Some(AttributeValue::Relations(vec![member_oid]))
    );
    Ok(())
}

#[test]
fn attachments_use_the_attachment_relation() -> AnyResult<()> {
    let fx = fixture()?;
    let story_oid = fx.store.seed("Story", [("Name", "with files".into())])?;
    let file_oid = fx.store.seed("Attachment", [("Name", "spec.pdf".into())])?;
    let story = fx.session.get::<Story>(&story_oid)?.expect("story exists");
    let file = fx.session.get::<Attachment>(&file_oid)?.expect("attachment exists");

    story.attachments().add(&file)?;
    assert_eq!(story.attachments().to_vec()?, vec![file]);
    Ok(())
}
