//! Expansion for `#[mapper]` (spec §4.7/§9's "dynamic proxy"): turns a
//! trait definition into a dispatching mapper interface with a provided
//! body per method, generated from a build-time method-id table instead of
//! a reflective method-to-statement walk.
//!
//! Grounded in the same shape as a `sql_get`/`sql_list`/... attribute
//! macro: each annotated function gets wrapped so its body can call a
//! generated dispatch helper, rather than requiring the caller to write
//! the session plumbing by hand.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_quote, FnArg, Ident, ItemTrait, Pat, ReturnType, TraitItem, TraitItemFn, Type};

use crate::common::syn_types::{last_segment_is, option_inner, vec_inner};

/// Which session call a method's body should dispatch through.
enum Kind {
    Insert,
    Update,
    Delete,
    Select { map_key: Option<String>, cursor: bool },
    Flush,
}

pub fn expand(mut item: ItemTrait) -> syn::Result<TokenStream> {
    let trait_name = item.ident.to_string();

    // Every generated body dispatches through `dynasql::proxy::MapperProxy`;
    // require it so `self.session()` resolves without per-trait boilerplate.
    item.supertraits.push(parse_quote!(dynasql::proxy::MapperProxy));

    let mut method_ids = Vec::new();

    for trait_item in item.items.iter_mut() {
        let TraitItem::Fn(method) = trait_item else { continue };
        let Some(kind) = extract_kind(method)? else { continue };
        let method_name = method.sig.ident.to_string();
        let statement_id = format!("{trait_name}.{method_name}");
        method_ids.push(statement_id.clone());
        method.default = Some(build_body(&statement_id, method, &kind)?);
        method.semi_token = None;
    }

    let method_id_consts = method_ids.iter().map(|id| quote! { #id });
    let table_name = format_ident!("{}_METHOD_IDS", to_upper_snake(&trait_name));
    let vis = &item.vis;

    Ok(quote! {
        #item

        #vis static #table_name: &[&str] = &[ #(#method_id_consts),* ];
    })
}

/// Read the recognized dispatch attribute (`insert`/`update`/`delete`/
/// `select`/`flush`) off a method, if any, and remove it from the method's
/// attribute list. Methods with no recognized attribute are left untouched
/// (a trait may freely mix dispatched methods with ordinary default/helper
/// methods, per spec §4.7's "default/provided-body method" case).
fn extract_kind(method: &mut TraitItemFn) -> syn::Result<Option<Kind>> {
    let mut found = None;
    let mut keep = Vec::new();
    for attr in method.attrs.drain(..) {
        if found.is_some() {
            keep.push(attr);
            continue;
        }
        let name = attr.path().get_ident().map(|i| i.to_string());
        match name.as_deref() {
            Some("insert") => found = Some(Kind::Insert),
            Some("update") => found = Some(Kind::Update),
            Some("delete") => found = Some(Kind::Delete),
            Some("flush") => found = Some(Kind::Flush),
            Some("select") => {
                let mut map_key = None;
                let mut cursor = false;
                let _ = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("map_key") {
                        let value: syn::LitStr = meta.value()?.parse()?;
                        map_key = Some(value.value());
                    } else if meta.path.is_ident("cursor") {
                        cursor = true;
                    }
                    Ok(())
                });
                found = Some(Kind::Select { map_key, cursor });
            }
            _ => keep.push(attr),
        }
    }
    method.attrs = keep;
    Ok(found)
}

/// Split a method's declared parameters (past `&self`) into domain
/// parameters (participate in SQL binding) and the recognized paging /
/// result-handler slots (spec §4.5).
struct Params {
    domain: Vec<(Ident, Type)>,
    bounds_arg: Option<Ident>,
    handler_arg: Option<Ident>,
}

fn split_params(method: &TraitItemFn) -> Params {
    let mut domain = Vec::new();
    let mut bounds_arg = None;
    let mut handler_arg = None;
    for arg in method.sig.inputs.iter() {
        let FnArg::Typed(pat_type) = arg else { continue };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else { continue };
        let name = pat_ident.ident.clone();
        if last_segment_is(&pat_type.ty, "RowBounds") {
            bounds_arg = Some(name);
        } else if last_segment_is(&pat_type.ty, "ResultHandler") {
            handler_arg = Some(name);
        } else {
            domain.push((name, (*pat_type.ty).clone()));
        }
    }
    Params { domain, bounds_arg, handler_arg }
}

/// Build the parameter object expression: the lone domain arg directly if
/// there is exactly one, else a `param<k>`/named object (spec §4.5's
/// `convert-args`, computed here at expansion time since the parameter
/// count is already known).
fn build_param_expr(domain: &[(Ident, Type)]) -> TokenStream {
    match domain {
        [] => quote! { serde_json::Value::Null },
        [(name, _)] => quote! {
            serde_json::to_value(&#name)
                .map_err(|e| dynasql::MapperError::build(e.to_string()))?
        },
        many => {
            let inserts = many.iter().enumerate().map(|(i, (name, _))| {
                let key = name.to_string();
                let alias = format!("param{}", i + 1);
                quote! {
                    __dynasql_map.insert(#key.to_string(), serde_json::to_value(&#name).map_err(|e| dynasql::MapperError::build(e.to_string()))?);
                    __dynasql_map.insert(#alias.to_string(), serde_json::to_value(&#name).map_err(|e| dynasql::MapperError::build(e.to_string()))?);
                }
            });
            quote! {
                {
                    let mut __dynasql_map = serde_json::Map::new();
                    #(#inserts)*
                    serde_json::Value::Object(__dynasql_map)
                }
            }
        }
    }
}

fn build_body(statement_id: &str, method: &TraitItemFn, kind: &Kind) -> syn::Result<syn::Block> {
    let params = split_params(method);
    let param_expr = build_param_expr(&params.domain);
    let bounds_expr = match &params.bounds_arg {
        Some(name) => quote! { Some(#name) },
        None => quote! { None },
    };

    let body = match kind {
        Kind::Insert | Kind::Update | Kind::Delete => {
            let call = match kind {
                Kind::Insert => quote! { insert },
                Kind::Update => quote! { update },
                Kind::Delete => quote! { delete },
                Kind::Flush | Kind::Select { .. } => unreachable!(),
            };
            let coercion = row_count_return(&method.sig.output);
            quote! {
                let __dynasql_param = #param_expr;
                let __dynasql_n = self.session().#call(#statement_id, &__dynasql_param).await?;
                Ok(dynasql::row_count_result(__dynasql_n, #coercion).and_then(|v| {
                    serde_json::from_value(v).map_err(|e| dynasql::MapperError::build(e.to_string()))
                })?)
            }
        }
        Kind::Flush => quote! {
            self.session().flush_statements().await
        },
        Kind::Select { map_key, cursor } => {
            if *cursor {
                quote! {
                    let __dynasql_param = #param_expr;
                    self.session().select_cursor(#statement_id, &__dynasql_param, #bounds_expr).await
                }
            } else if let Some(handler_arg) = &params.handler_arg {
                quote! {
                    let __dynasql_param = #param_expr;
                    self.session().select_with_handler(#statement_id, &__dynasql_param, #bounds_expr, #handler_arg).await
                }
            } else if let Some(map_key) = map_key {
                quote! {
                    let __dynasql_param = #param_expr;
                    let __dynasql_rows = self.session().select_map(#statement_id, &__dynasql_param, #map_key, #bounds_expr).await?;
                    let mut __dynasql_out = std::collections::HashMap::new();
                    for (k, v) in __dynasql_rows {
                        __dynasql_out.insert(k, serde_json::from_value(v).map_err(|e| dynasql::MapperError::evaluation(e.to_string()))?);
                    }
                    Ok(__dynasql_out)
                }
            } else if is_vec_return(&method.sig.output) {
                quote! {
                    let __dynasql_param = #param_expr;
                    let __dynasql_rows = self.session().select_list(#statement_id, &__dynasql_param, #bounds_expr).await?;
                    __dynasql_rows
                        .into_iter()
                        .map(|v| serde_json::from_value(v).map_err(|e| dynasql::MapperError::evaluation(e.to_string())))
                        .collect::<dynasql::MapperResult<_>>()
                }
            } else if is_option_return(&method.sig.output) {
                quote! {
                    let __dynasql_param = #param_expr;
                    let __dynasql_row = self.session().select_one(#statement_id, &__dynasql_param, #bounds_expr).await?;
                    __dynasql_row
                        .map(|v| serde_json::from_value(v).map_err(|e| dynasql::MapperError::evaluation(e.to_string())))
                        .transpose()
                }
            } else {
                quote! {
                    let __dynasql_param = #param_expr;
                    let __dynasql_row = self.session().select_one(#statement_id, &__dynasql_param, #bounds_expr).await?;
                    match __dynasql_row {
                        Some(v) => serde_json::from_value(v).map_err(|e| dynasql::MapperError::evaluation(e.to_string())),
                        None => Err(dynasql::MapperError::unsupported_return_type(
                            concat!("'", #statement_id, "' returned null for a non-optional scalar return")
                        )),
                    }
                }
            }
        }
    };

    syn::parse2(quote! { { #body } })
}

fn is_vec_return(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => ok_inner(ty).map(|t| vec_inner(t).is_some()).unwrap_or(false),
        ReturnType::Default => false,
    }
}

fn is_option_return(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => ok_inner(ty).map(|t| option_inner(t).is_some()).unwrap_or(false),
        ReturnType::Default => false,
    }
}

/// Extract `T` from a `MapperResult<T>` (i.e. `Result<T, _>`) return type.
fn ok_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else { return None };
    let seg = type_path.path.segments.last()?;
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else { return None };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn row_count_return(output: &ReturnType) -> TokenStream {
    let ReturnType::Type(_, ty) = output else {
        return quote! { dynasql::RowCountReturn::Void };
    };
    let Some(inner) = ok_inner(ty) else {
        return quote! { dynasql::RowCountReturn::Void };
    };
    if last_segment_is(inner, "i32") {
        quote! { dynasql::RowCountReturn::I32 }
    } else if last_segment_is(inner, "i64") {
        quote! { dynasql::RowCountReturn::I64 }
    } else if last_segment_is(inner, "bool") {
        quote! { dynasql::RowCountReturn::Bool }
    } else {
        quote! { dynasql::RowCountReturn::Void }
    }
}

fn to_upper_snake(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(ch.to_uppercase());
    }
    out
}
