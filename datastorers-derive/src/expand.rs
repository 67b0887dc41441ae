use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::attrs::{EntityDef, FieldRole};

pub fn expand(def: &EntityDef) -> TokenStream {
    let managed = managed_impl(def);
    let from_entity = from_entity_impl(def);
    let into_entity = into_entity_impl(def);
    let methods = inherent_impl(def);
    quote! {
        #managed
        #from_entity
        #into_entity
        #methods
    }
}

fn managed_impl(def: &EntityDef) -> TokenStream {
    let ident = &def.ident;
    let kind = &def.kind;
    let page_size = def.page_size;
    quote! {
        impl ::datastorers::DatastoreManaged for #ident {
            const KIND: &'static str = #kind;
            const PAGE_SIZE: i32 = #page_size;
        }
    }
}

fn from_entity_impl(def: &EntityDef) -> TokenStream {
    let ident = &def.ident;
    let key = match def.key_field() {
        Some(_) => quote!(key),
        None => quote!(_),
    };
    let version = match def.version_field() {
        Some(_) => quote!(version),
        None => quote!(_),
    };
    let properties = match def.properties().next() {
        Some(_) => quote!(mut properties),
        None => quote!(_),
    };
    let inits = def.fields.iter().map(|field| {
        let name = &field.ident;
        match field.role {
            FieldRole::Key => quote!(#name: key),
            FieldRole::Version => quote!(#name: version),
            FieldRole::Property => {
                let property = &field.property;
                quote!(#name: properties.take_value(#property)?)
            }
        }
    });

    quote! {
        impl ::std::convert::TryFrom<::datastorers::DatastoreEntity> for #ident {
            type Error = ::datastorers::DatastorersError;

            fn try_from(
                entity: ::datastorers::DatastoreEntity,
            ) -> ::std::result::Result<Self, Self::Error> {
                entity.expect_kind(<Self as ::datastorers::DatastoreManaged>::KIND)?;
                let (#key, #properties, #version) = entity.into_parts();
                ::std::result::Result::Ok(#ident { #(#inits,)* })
            }
        }
    }
}

fn into_entity_impl(def: &EntityDef) -> TokenStream {
    let ident = &def.ident;
    let value = if def.fields.is_empty() {
        quote!(_value)
    } else {
        quote!(value)
    };
    let kind = quote!(<#ident as ::datastorers::DatastoreManaged>::KIND);
    let key = match def.key_field() {
        Some(field) => {
            let name = &field.ident;
            quote!(value.#name.unwrap_or_else(|| ::datastorers::Key::incomplete(#kind)))
        }
        None => quote!(::datastorers::Key::incomplete(#kind)),
    };
    let version = match def.version_field() {
        Some(field) => {
            let name = &field.ident;
            quote!(value.#name)
        }
        None => quote!(::std::option::Option::None),
    };
    let mutability = match def.properties().next() {
        Some(_) => quote!(mut),
        None => quote!(),
    };
    let sets = def.properties().map(|field| {
        let name = &field.ident;
        let property = &field.property;
        let indexed = !field.unindexed;
        quote!(properties.set(#property, value.#name, #indexed);)
    });

    quote! {
        impl ::std::convert::TryFrom<#ident> for ::datastorers::DatastoreEntity {
            type Error = ::datastorers::DatastorersError;

            fn try_from(#value: #ident) -> ::std::result::Result<Self, Self::Error> {
                let key = #key;
                let #mutability properties = ::datastorers::DatastoreProperties::new();
                #(#sets)*
                ::std::result::Result::Ok(::datastorers::DatastoreEntity::new(
                    ::std::option::Option::Some(key),
                    properties,
                    #version,
                ))
            }
        }
    }
}

fn inherent_impl(def: &EntityDef) -> TokenStream {
    let ident = &def.ident;
    let result = quote!(::std::result::Result<Self, ::datastorers::DatastorersError>);
    let collection = quote! {
        ::std::result::Result<
            ::datastorers::ResultCollection<Self>,
            ::datastorers::DatastorersError,
        >
    };

    let by_property = def.properties().filter(|f| f.indexed).map(|field| {
        let one = format_ident!("get_one_by_{}", field.ident);
        let many = format_ident!("get_by_{}", field.ident);
        let ty = field.query_type();
        let property = &field.property;
        quote! {
            pub async fn #one(
                value: #ty,
                connection: &impl ::datastorers::DatastoreConnection,
            ) -> #result {
                ::datastorers::query::get_one_by_property::<Self>(
                    #property,
                    ::datastorers::entity::query_value(value),
                    connection,
                )
                .await
            }

            pub async fn #many(
                value: #ty,
                connection: &impl ::datastorers::DatastoreConnection,
            ) -> #collection {
                ::datastorers::query::get_by_property::<Self>(
                    #property,
                    ::datastorers::entity::query_value(value),
                    connection,
                )
                .await
            }
        }
    });

    let key_accessors = def.key_field().map(|field| {
        let name = &field.ident;
        quote! {
            pub fn id(&self) -> ::std::option::Option<i64> {
                self.#name.as_ref().and_then(::datastorers::Key::id)
            }

            pub fn key_name(&self) -> ::std::option::Option<&str> {
                self.#name.as_ref().and_then(::datastorers::Key::name)
            }
        }
    });

    quote! {
        impl #ident {
            pub async fn get_one_by_id(
                id: i64,
                connection: &impl ::datastorers::DatastoreConnection,
            ) -> #result {
                ::datastorers::query::get_one_by_id::<Self>(id, connection).await
            }

            pub async fn get_one_by_name(
                name: &str,
                connection: &impl ::datastorers::DatastoreConnection,
            ) -> #result {
                ::datastorers::query::get_one_by_name::<Self>(name, connection).await
            }

            pub async fn get_all(
                connection: &impl ::datastorers::DatastoreConnection,
            ) -> #collection {
                ::datastorers::query::get_all::<Self>(connection).await
            }

            #(#by_property)*
            #key_accessors
        }
    }
}
