//! Type helper utilities for syn type analysis.
//!
//! Shared by the return-type classification in `signature.rs`: the
//! `#[mapper]` macro inspects a trait method's return type at expansion time
//! to decide whether it's `returns_many`, `returns_optional`, and so on.

/// Extract the inner type T from Option<T>, or return None if not an Option type.
///
/// Recognizes `Option<T>`, `std::option::Option<T>`, and `core::option::Option<T>`.
pub fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    generic_inner(ty, "Option")
}

/// Extract the inner type T from Vec<T>, or return None if not a Vec type.
///
/// Recognizes `Vec<T>` and `std::vec::Vec<T>`.
pub fn vec_inner(ty: &syn::Type) -> Option<&syn::Type> {
    generic_inner(ty, "Vec")
}

/// Extract the element type from a single-element generic container
/// (`Option<T>`, `Vec<T>`, `Box<T>`, ...) whose last path segment matches `name`.
fn generic_inner<'t>(ty: &'t syn::Type, name: &str) -> Option<&'t syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    if seg.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

/// Does this path type's last segment match `name` (ignoring any module prefix)?
///
/// Used to recognize `Vec<T>` / `HashMap<K, V>` / `BTreeMap<K, V>` / `Cursor<T>`
/// regardless of which module path the caller wrote them under.
pub fn last_segment_is(ty: &syn::Type, name: &str) -> bool {
    let syn::Type::Path(type_path) = ty else {
        return false;
    };
    type_path
        .path
        .segments
        .last()
        .is_some_and(|seg| seg.ident == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_option_inner() {
        let ty: syn::Type = parse_quote!(Option<String>);
        assert!(option_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(std::option::Option<i32>);
        assert!(option_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(String);
        assert!(option_inner(&ty).is_none());

        let ty: syn::Type = parse_quote!(Vec<String>);
        assert!(option_inner(&ty).is_none());
    }

    #[test]
    fn test_vec_inner() {
        let ty: syn::Type = parse_quote!(Vec<String>);
        assert!(vec_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(std::vec::Vec<i32>);
        assert!(vec_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(String);
        assert!(vec_inner(&ty).is_none());

        let ty: syn::Type = parse_quote!(Option<String>);
        assert!(vec_inner(&ty).is_none());
    }

    #[test]
    fn test_last_segment_is() {
        let ty: syn::Type = parse_quote!(std::collections::HashMap<String, User>);
        assert!(last_segment_is(&ty, "HashMap"));
        assert!(!last_segment_is(&ty, "BTreeMap"));
    }
}
