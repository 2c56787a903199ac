use quote::ToTokens;
use std::collections::HashSet;
use syn::punctuated::Punctuated;
use syn::{Attribute, Path, Token};

// 拆分出已有的 derive 列表，其余属性原样保留
fn take_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<Path>) {
    let mut others = Vec::new();
    let mut derived = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("derive") {
            others.push(attr.clone());
            continue;
        }
        if let Ok(list) = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated) {
            derived.extend(list);
        }
    }
    (others, derived)
}

// 以最后一段作为去重 key：`std::fmt::Debug` 与 `Debug` 视为同一个
fn derive_key(path: &Path) -> String {
    match path.segments.last() {
        Some(segment) => segment.ident.to_string(),
        None => path.to_token_stream().to_string(),
    }
}

/// 把 `required` 合并进结构体的 derive 列表（去重，required 在前）
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<Path>) {
    let (others, existing) = take_derives(attrs);
    let mut seen = HashSet::new();
    let merged: Vec<Path> = required
        .into_iter()
        .chain(existing)
        .filter(|path| seen.insert(derive_key(path)))
        .collect();
    let derive: Attribute = syn::parse_quote!(#[derive(#(#merged),*)]);
    *attrs = std::iter::once(derive).chain(others).collect();
}
