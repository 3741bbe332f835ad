//! Proc macros for `dynasql`.
//!
//! `#[mapper]` realizes the "dynamic proxy" requirement at compile time
//! (spec §4.7/§9): Rust has no runtime equivalent to a reflective dynamic
//! proxy, so the attribute expands a trait definition into one whose
//! methods carry a generated default body that dispatches through a
//! [`dynasql::proxy::MapperProxy`](../dynasql/proxy/trait.MapperProxy.html).

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod common;
mod mapper_attr;

/// Turn a trait definition into a dispatching mapper interface.
///
/// Each dispatched method is annotated with one of `#[insert]`,
/// `#[update]`, `#[delete]`, `#[select]`, or `#[flush]`, takes `&self` plus
/// its domain parameters, and returns `dynasql::MapperResult<T>`. The
/// attribute fills in the method body; the implementing type only needs to
/// supply `dynasql::proxy::MapperProxy::session`.
///
/// ```ignore
/// use dynasql::mapper;
///
/// #[mapper]
/// pub trait UserMapper {
///     #[select]
///     async fn find_by_id(&self, id: i64) -> dynasql::MapperResult<Option<User>>;
///
///     #[select(map_key = "id")]
///     async fn find_all(&self) -> dynasql::MapperResult<std::collections::HashMap<String, User>>;
///
///     #[insert]
///     async fn create(&self, user: NewUser) -> dynasql::MapperResult<i64>;
///
///     #[flush]
///     async fn flush(&self) -> dynasql::MapperResult<()>;
/// }
/// ```
///
/// Statement ids are `<TraitName>.<method_name>`; a `<TraitName>_METHOD_IDS`
/// static is emitted alongside the trait, listing every dispatched method's
/// id in declaration order.
#[proc_macro_attribute]
pub fn mapper(_args: TokenStream, input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as syn::ItemTrait);
    mapper_attr::expand(item)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
