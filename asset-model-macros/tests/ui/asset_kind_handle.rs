use asset_model::asset::Asset;
use asset_model::oid::Oid;
use asset_model_macros::asset_kind;

#[asset_kind(asset_type = "Member", discriminant = -1)]
pub struct Retired(pub Asset);

// Deref 到 Asset：句柄方法可直接在具体类型上调用
fn identity(member: &Retired) -> Oid {
    member.oid()
}

fn main() {
    let _ = identity as fn(&Retired) -> Oid;
}
