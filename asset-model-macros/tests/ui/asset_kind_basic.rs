use asset_model::asset::Asset;
use asset_model::registry::AssetKind;
use asset_model_macros::asset_kind;

#[asset_kind(asset_type = "Story", select = ["Name", "Number"], order = "Order")]
struct Story(Asset);

#[asset_kind(asset_type = "Story", discriminant = 200)]
#[derive(Debug)]
struct StoryTemplate(Asset);

fn main() {
    assert_eq!(Story::ASSET_TYPE, "Story");
    assert_eq!(Story::DISCRIMINANT, None);
    assert_eq!(Story::DEFAULT_SELECTION, &["Name", "Number"]);
    assert_eq!(Story::DEFAULT_ORDER, Some("Order"));

    assert_eq!(StoryTemplate::DISCRIMINANT, Some(200));
    assert!(StoryTemplate::DEFAULT_SELECTION.is_empty());
    assert_eq!(StoryTemplate::descriptor().asset_type, "Story");
}
