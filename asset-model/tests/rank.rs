mod common;

use anyhow::Result as AnyResult;
use asset_model::rank::Ranked;
use asset_model::remote::Query;
use common::{NAME, Story, fixture};

fn names(stories: &[Story]) -> AnyResult<Vec<String>> {
    let mut names = Vec::new();
    for story in stories {
        names.push(story.get(&NAME)?.unwrap_or_default());
    }
    Ok(names)
}

#[test]
fn set_above_is_transitive() -> AnyResult<()> {
    let fx = fixture()?;
    for name in ["c", "b", "a"] {
        fx.store.seed("Story", [("Name", name.into())])?;
    }
    let stories = fx.session.query::<Story>(Query::builder().asset_type("Story").build())?;
    let [c, b, a] = <[Story; 3]>::try_from(stories).map_err(|_| anyhow::anyhow!("three stories"))?;

    b.rank().set_above(&c)?;
    a.rank().set_above(&b)?;

    assert!(a.rank().is_above(&b)?);
    assert!(b.rank().is_above(&c)?);
    assert!(a.rank().is_above(&c)?);
    assert!(c.rank().is_below(&a)?);

    let ordered = fx.session.query::<Story>(Query::builder().asset_type("Story").build())?;
    assert_eq!(names(&ordered)?, vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn set_below_moves_after_the_target() -> AnyResult<()> {
    let fx = fixture()?;
    for name in ["first", "second", "third"] {
        fx.store.seed("Story", [("Name", name.into())])?;
    }
    let stories = fx.session.query::<Story>(Query::builder().asset_type("Story").build())?;
    let (first, third) = (&stories[0], &stories[2]);

    first.rank().set_below(third)?;
    assert!(first.rank().is_below(third)?);
    assert!(!first.is_dirty());

    let ordered = fx.session.query::<Story>(Query::builder().asset_type("Story").build())?;
    assert_eq!(names(&ordered)?, vec!["second", "third", "first"]);
    Ok(())
}

#[test]
fn rank_values_carry_companions() -> AnyResult<()> {
    let fx = fixture()?;
    let oid = fx.store.seed("Story", [("Name", "solo".into())])?;
    let story = fx.session.get::<Story>(&oid)?.expect("story exists");

    let value = story.rank().value()?;
    assert!(value.before().is_some());
    assert!(value.after().is_some());
    Ok(())
}

#[test]
fn repeated_moves_into_a_shrinking_gap_keep_their_order() -> AnyResult<()> {
    let fx = fixture()?;
    let mut stories = Vec::new();
    for name in ["anchor", "left", "right"] {
        let oid = fx.store.seed("Story", [("Name", name.into())])?;
        stories.push(fx.session.get::<Story>(&oid)?.expect("story exists"));
    }
    let [anchor, left, right] =
        <[Story; 3]>::try_from(stories).map_err(|_| anyhow::anyhow!("three stories"))?;

    // 每次移动都把间隔减半，远超键空间能直接容纳的次数
    for round in 0..40 {
        let (mover, other) = if round % 2 == 0 {
            (&right, &left)
        } else {
            (&left, &right)
        };
        mover.rank().set_below(&anchor)?;
        assert!(mover.rank().is_below(&anchor)?, "round {round}");
        assert!(mover.rank().is_above(other)?, "round {round}");
    }
    Ok(())
}
