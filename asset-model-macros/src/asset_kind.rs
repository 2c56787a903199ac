use crate::derive_utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Expr, ExprAssign, Item, LitStr, Result as SynResult, Token, parse_macro_input};

/// #[asset_kind] 参数：asset_type = "T", discriminant = <int>, order = "A", select = ["A", ...]
struct AssetKindConfig {
    asset_type: LitStr,
    discriminant: Option<Expr>,
    order: Option<LitStr>,
    select: Vec<LitStr>,
}

fn lit_str(expr: &Expr, key: &str) -> SynResult<LitStr> {
    match expr {
        Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(s),
            ..
        }) => Ok(s.clone()),
        other => Err(syn::Error::new(
            other.span(),
            format!("'{key}' expects a string literal"),
        )),
    }
}

fn integer(expr: &Expr) -> SynResult<Expr> {
    let is_int = |e: &Expr| {
        matches!(
            e,
            Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Int(_),
                ..
            })
        )
    };
    match expr {
        e if is_int(e) => Ok(e.clone()),
        Expr::Unary(u) if matches!(u.op, syn::UnOp::Neg(_)) && is_int(&*u.expr) => Ok(expr.clone()),
        other => Err(syn::Error::new(
            other.span(),
            "'discriminant' expects an integer literal",
        )),
    }
}

impl Parse for AssetKindConfig {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let mut asset_type: Option<LitStr> = None;
        let mut discriminant: Option<Expr> = None;
        let mut order: Option<LitStr> = None;
        let mut select: Option<Vec<LitStr>> = None;

        let pairs = Punctuated::<ExprAssign, Token![,]>::parse_terminated(input)?;
        for assign in pairs {
            let key = match *assign.left {
                Expr::Path(p) if p.path.segments.len() == 1 => p.path.segments[0].ident.clone(),
                other => {
                    return Err(syn::Error::new(other.span(), "expected `key = value`"));
                }
            };
            let duplicate = || syn::Error::new(key.span(), format!("duplicate key '{key}'"));
            match key.to_string().as_str() {
                "asset_type" => {
                    if asset_type.is_some() {
                        return Err(duplicate());
                    }
                    asset_type = Some(lit_str(&assign.right, "asset_type")?);
                }
                "discriminant" => {
                    if discriminant.is_some() {
                        return Err(duplicate());
                    }
                    discriminant = Some(integer(&assign.right)?);
                }
                "order" => {
                    if order.is_some() {
                        return Err(duplicate());
                    }
                    order = Some(lit_str(&assign.right, "order")?);
                }
                "select" => {
                    if select.is_some() {
                        return Err(duplicate());
                    }
                    let Expr::Array(array) = &*assign.right else {
                        return Err(syn::Error::new(
                            assign.right.span(),
                            "'select' expects an array of string literals",
                        ));
                    };
                    select = Some(
                        array
                            .elems
                            .iter()
                            .map(|e| lit_str(e, "select"))
                            .collect::<SynResult<_>>()?,
                    );
                }
                _ => {
                    return Err(syn::Error::new(
                        key.span(),
                        "unknown key; expected 'asset_type', 'discriminant', 'order' or 'select'",
                    ));
                }
            }
        }

        let asset_type = asset_type.ok_or_else(|| {
            syn::Error::new(
                proc_macro2::Span::call_site(),
                "missing required key 'asset_type'",
            )
        })?;
        Ok(Self {
            asset_type,
            discriminant,
            order,
            select: select.unwrap_or_default(),
        })
    }
}

/// #[asset_kind] 宏实现
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as AssetKindConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[asset_kind] only on struct")
                .to_compile_error()
                .into();
        }
    };

    match &st.fields {
        syn::Fields::Unnamed(f) if f.unnamed.len() == 1 => {}
        _ => {
            return syn::Error::new(
                st.span(),
                "#[asset_kind] requires a tuple struct wrapping the asset handle, e.g., struct Story(Asset);",
            )
            .to_compile_error()
            .into();
        }
    }
    if !st.generics.params.is_empty() {
        return syn::Error::new(st.generics.span(), "#[asset_kind] does not support generics")
            .to_compile_error()
            .into();
    }

    apply_derives(
        &mut st.attrs,
        vec![
            syn::parse_quote!(Clone),
            syn::parse_quote!(Debug),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(Eq),
            syn::parse_quote!(Hash),
        ],
    );

    let ident = &st.ident;
    let asset_type = &cfg.asset_type;
    let discriminant = match &cfg.discriminant {
        Some(value) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    };
    let order = match &cfg.order {
        Some(value) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    };
    let select = &cfg.select;

    let out = quote! {
        #st

        impl ::asset_model::registry::AssetKind for #ident {
            const ASSET_TYPE: &'static str = #asset_type;
            const DISCRIMINANT: ::core::option::Option<i64> = #discriminant;
            const DEFAULT_SELECTION: &'static [&'static str] = &[#(#select),*];
            const DEFAULT_ORDER: ::core::option::Option<&'static str> = #order;

            fn from_asset(asset: ::asset_model::asset::Asset) -> Self {
                Self(asset)
            }

            fn asset(&self) -> &::asset_model::asset::Asset {
                &self.0
            }
        }

        impl ::core::ops::Deref for #ident {
            type Target = ::asset_model::asset::Asset;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };

    TokenStream::from(out)
}
