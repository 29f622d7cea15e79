use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

pub fn derive_component(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let struct_name = &ast.ident;

    // ::chunked_ecs::component::Component resolves both inside and outside the
    // crate: inside, via `extern crate self as chunked_ecs;` in lib.rs; outside,
    // as the normal dependency path.
    TokenStream::from(quote! {
        impl ::chunked_ecs::component::Component for #struct_name {}
    })
}
