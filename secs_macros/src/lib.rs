use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, DeriveInput};

/// Derives `secs::component::Component`.
///
/// The generated `id()` owns a per-type static key that is bound to the next
/// free `TypeKey` the first time it is read (or eagerly by `Ecs::register`).
///
/// ```ignore
/// #[derive(Clone, Component)]
/// struct Position { x: f32, y: f32 }
///
/// #[derive(Clone, Component)]
/// #[component(in_place)]
/// struct Sprite { frame: u32 }
/// ```
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_component(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_component(input: &DeriveInput) -> syn::Result<TokenStream2> {
    // A static inside a generic fn is shared by every instantiation, so
    // generic types would all collapse onto one key.
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "generic types cannot derive Component: every component needs its own key",
        ));
    }

    let name = &input.ident;
    let policy = parse_policy(&input.attrs)?;

    Ok(quote! {
        unsafe impl secs::component::Component for #name {
            const POLICY: secs::component::DeletionPolicy = #policy;

            #[inline]
            fn id() -> secs::ecs::TypeKey {
                static KEY: ::std::sync::atomic::AtomicU32 =
                    ::std::sync::atomic::AtomicU32::new(secs::ecs::TypeKey::UNASSIGNED);
                secs::ecs::Ecs::resolve(&KEY)
            }
        }
    })
}

fn parse_policy(attrs: &[Attribute]) -> syn::Result<TokenStream2> {
    let mut in_place = false;
    for attr in attrs {
        if !attr.path().is_ident("component") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("in_place") {
                in_place = true;
                Ok(())
            } else if meta.path.is_ident("swap_remove") {
                in_place = false;
                Ok(())
            } else {
                Err(meta.error("expected `in_place` or `swap_remove`"))
            }
        })?;
    }

    Ok(if in_place {
        quote! { secs::component::DeletionPolicy::InPlace }
    } else {
        quote! { secs::component::DeletionPolicy::SwapRemove }
    })
}
