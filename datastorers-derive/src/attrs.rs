//! Parsing and validation of the derive input.

use std::collections::HashSet;

use syn::{
    Attribute, Data, DeriveInput, Expr, ExprLit, Field, Fields, GenericArgument, Ident, Lit,
    LitInt, LitStr, Meta, PathArguments, Type,
};

pub const DEFAULT_PAGE_SIZE: i32 = 100;

/// Method names generated for every entity, which indexed fields must not shadow.
const RESERVED_LOOKUPS: [&str; 2] = ["id", "name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Key,
    Version,
    Property,
}

#[derive(Debug)]
pub struct FieldDef {
    pub ident: Ident,
    pub ty: Type,
    pub role: FieldRole,
    pub property: String,
    /// Generates `get_one_by_<field>` and `get_by_<field>`.
    pub indexed: bool,
    /// Stored with `excludeFromIndexes`, so it can never be filtered on.
    pub unindexed: bool,
}

#[derive(Debug)]
pub struct EntityDef {
    pub ident: Ident,
    pub kind: String,
    pub page_size: i32,
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    pub fn from_derive_input(input: &DeriveInput) -> syn::Result<Self> {
        if !input.generics.params.is_empty() || input.generics.where_clause.is_some() {
            return Err(syn::Error::new_spanned(
                &input.generics,
                "DatastoreManaged cannot be derived for generic types",
            ));
        }
        let named = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => named,
                _ => {
                    return Err(syn::Error::new_spanned(
                        &input.ident,
                        "DatastoreManaged requires a struct with named fields",
                    ))
                }
            },
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "DatastoreManaged can only be derived for structs",
                ))
            }
        };

        let mut kind: Option<LitStr> = None;
        let mut page_size: Option<LitInt> = None;
        for attr in &input.attrs {
            if attr.path().is_ident("kind") {
                if kind.is_some() {
                    return Err(duplicate(attr, "kind"));
                }
                kind = Some(non_empty(string_value(attr, "kind")?)?);
            } else if attr.path().is_ident("page_size") {
                if page_size.is_some() {
                    return Err(duplicate(attr, "page_size"));
                }
                page_size = Some(int_value(attr, "page_size")?);
            }
        }

        let page_size = match page_size {
            Some(lit) => {
                let size: i32 = lit.base10_parse()?;
                if size <= 0 {
                    return Err(syn::Error::new_spanned(lit, "page_size must be positive"));
                }
                size
            }
            None => DEFAULT_PAGE_SIZE,
        };

        let fields = named
            .named
            .iter()
            .map(FieldDef::from_field)
            .collect::<syn::Result<Vec<_>>>()?;
        check_fields(&fields)?;

        Ok(EntityDef {
            ident: input.ident.clone(),
            kind: kind
                .map(|k| k.value())
                .unwrap_or_else(|| input.ident.to_string()),
            page_size,
            fields,
        })
    }

    pub fn key_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.role == FieldRole::Key)
    }

    pub fn version_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.role == FieldRole::Version)
    }

    pub fn properties(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.role == FieldRole::Property)
    }
}

impl FieldDef {
    fn from_field(field: &Field) -> syn::Result<Self> {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;

        let mut key = None;
        let mut version = None;
        let mut indexed = None;
        let mut unindexed = None;
        let mut property: Option<(&Attribute, LitStr)> = None;
        for attr in &field.attrs {
            if attr.path().is_ident("key") {
                flag(&mut key, attr, "key")?;
            } else if attr.path().is_ident("version") {
                flag(&mut version, attr, "version")?;
            } else if attr.path().is_ident("indexed") {
                flag(&mut indexed, attr, "indexed")?;
            } else if attr.path().is_ident("unindexed") {
                flag(&mut unindexed, attr, "unindexed")?;
            } else if attr.path().is_ident("property") {
                if property.is_some() {
                    return Err(duplicate(attr, "property"));
                }
                property = Some((attr, non_empty(string_value(attr, "property")?)?));
            }
        }

        let role = match (key, version) {
            (Some(_), Some(attr)) => {
                return Err(syn::Error::new_spanned(
                    attr,
                    "a field cannot be both #[key] and #[version]",
                ))
            }
            (Some(_), None) => FieldRole::Key,
            (None, Some(_)) => FieldRole::Version,
            (None, None) => FieldRole::Property,
        };
        if role != FieldRole::Property {
            if let Some(attr) = indexed.or(unindexed) {
                return Err(syn::Error::new_spanned(
                    attr,
                    "#[key] and #[version] fields cannot be #[indexed] or #[unindexed]",
                ));
            }
            if let Some((attr, _)) = &property {
                return Err(syn::Error::new_spanned(
                    attr,
                    "#[key] and #[version] fields are not stored as properties",
                ));
            }
        }
        if let (Some(_), Some(attr)) = (indexed, unindexed) {
            return Err(syn::Error::new_spanned(attr, "an #[unindexed] field cannot be #[indexed]"));
        }

        Ok(FieldDef {
            property: property
                .map(|(_, lit)| lit.value())
                .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string()),
            ident,
            ty: field.ty.clone(),
            role,
            indexed: indexed.is_some(),
            unindexed: unindexed.is_some(),
        })
    }

    /// The type a query on this property takes: `Option<_>` and then `Vec<_>`
    /// stripped, since array properties match on any element.
    pub fn query_type(&self) -> &Type {
        let ty = generic_argument(&self.ty, "Option").unwrap_or(&self.ty);
        generic_argument(ty, "Vec").unwrap_or(ty)
    }
}

fn check_fields(fields: &[FieldDef]) -> syn::Result<()> {
    for role in [FieldRole::Key, FieldRole::Version] {
        if let Some(second) = fields.iter().filter(|f| f.role == role).nth(1) {
            let name = if role == FieldRole::Key {
                "key"
            } else {
                "version"
            };
            return Err(syn::Error::new_spanned(
                &second.ident,
                format!("only one field can be marked #[{name}]"),
            ));
        }
    }

    let mut seen = HashSet::new();
    for field in fields.iter().filter(|f| f.role == FieldRole::Property) {
        if !seen.insert(field.property.as_str()) {
            return Err(syn::Error::new_spanned(
                &field.ident,
                format!("property \"{}\" is mapped more than once", field.property),
            ));
        }
        let name = field.ident.to_string();
        if field.indexed && RESERVED_LOOKUPS.contains(&name.as_str()) {
            return Err(syn::Error::new_spanned(
                &field.ident,
                format!("an indexed field named `{name}` would clash with get_one_by_{name}"),
            ));
        }
    }
    Ok(())
}

fn flag<'a>(slot: &mut Option<&'a Attribute>, attr: &'a Attribute, name: &str) -> syn::Result<()> {
    if !matches!(attr.meta, Meta::Path(_)) {
        return Err(syn::Error::new_spanned(
            attr,
            format!("#[{name}] takes no arguments"),
        ));
    }
    if slot.is_some() {
        return Err(duplicate(attr, name));
    }
    *slot = Some(attr);
    Ok(())
}

fn duplicate(attr: &Attribute, name: &str) -> syn::Error {
    syn::Error::new_spanned(attr, format!("duplicate #[{name}] attribute"))
}

fn literal<'a>(attr: &'a Attribute, name: &str, example: &str) -> syn::Result<&'a Lit> {
    match &attr.meta {
        Meta::NameValue(nv) => match &nv.value {
            Expr::Lit(ExprLit { lit, .. }) => Ok(lit),
            other => Err(syn::Error::new_spanned(
                other,
                format!("expected a literal, as in #[{name} = {example}]"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            attr,
            format!("expected #[{name} = {example}]"),
        )),
    }
}

fn string_value(attr: &Attribute, name: &str) -> syn::Result<LitStr> {
    match literal(attr, name, "\"...\"")? {
        Lit::Str(lit) => Ok(lit.clone()),
        other => Err(syn::Error::new_spanned(
            other,
            format!("#[{name}] expects a string literal"),
        )),
    }
}

fn int_value(attr: &Attribute, name: &str) -> syn::Result<LitInt> {
    match literal(attr, name, "N")? {
        Lit::Int(lit) => Ok(lit.clone()),
        other => Err(syn::Error::new_spanned(
            other,
            format!("#[{name}] expects an integer literal"),
        )),
    }
}

fn non_empty(lit: LitStr) -> syn::Result<LitStr> {
    if lit.value().trim().is_empty() {
        return Err(syn::Error::new_spanned(lit, "the name must not be empty"));
    }
    Ok(lit)
}

/// `T` if `ty` is `wrapper<T>` (matched on the last path segment).
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    if path.qself.is_some() {
        return None;
    }
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}
