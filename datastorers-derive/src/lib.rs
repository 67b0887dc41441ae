//! `#[derive(DatastoreManaged)]` for the `datastorers` crate.
//!
//! Container attributes: `#[kind = "..."]`, `#[page_size = N]`.
//! Field attributes: `#[key]`, `#[version]`, `#[indexed]`, `#[unindexed]`,
//! `#[property = "..."]`.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod expand;

#[proc_macro_derive(
    DatastoreManaged,
    attributes(kind, page_size, key, version, indexed, unindexed, property)
)]
pub fn derive_datastore_managed(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    attrs::EntityDef::from_derive_input(&input)
        .map(|def| expand::expand(&def))
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
