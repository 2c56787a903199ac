mod asset_kind;
mod derive_utils;

use proc_macro::TokenStream;

/// 具体实体类型宏
/// - 仅支持单字段 tuple struct，字段类型为 `::asset_model::asset::Asset`
/// - 合并/追加派生：Clone, Debug, PartialEq, Eq, Hash
/// - 实现 `::asset_model::registry::AssetKind` 与 `Deref<Target = Asset>`
/// - 参数：`asset_type = "Story"`（必填）、`discriminant = 200`、`order = "Order"`、
///   `select = ["Name", "Number"]`
#[proc_macro_attribute]
pub fn asset_kind(attr: TokenStream, item: TokenStream) -> TokenStream {
    asset_kind::expand(attr, item)
}
