//! Procedural macros for Horizon Presentation binding data sources.
//!
//! This crate provides `#[derive(DataSource)]`, which describes a struct's
//! fields to the binding system so expressions like `{{Customer.Name}}` can
//! be resolved against it.
//!
//! # Member Mapping
//!
//! Every named field becomes a binding member whose name is the field name
//! in PascalCase (`first_name` becomes `FirstName`):
//!
//! - `Property<T>` fields become readable and writable members of type `T`
//! - any other field becomes a read-only member of the field's type, read by
//!   cloning
//!
//! # Attributes
//!
//! ```ignore
//! #[derive(DataSource)]
//! struct Order {
//!     #[data_source(rename = "ID")]
//!     id: u64,
//!
//!     #[data_source(navigate)]
//!     customer: Property<Option<Rc<Customer>>>,
//!
//!     #[data_source(read_only)]
//!     total: Property<f64>,
//!
//!     #[data_source(skip)]
//!     cache: RefCell<Vec<u8>>,
//! }
//! ```
//!
//! Field attributes:
//! - `rename = "Name"`: Uses the given member name instead of the PascalCase one
//! - `navigate`: Lets paths descend through the field via its `Navigable` impl,
//!   without cloning the value
//! - `read_only`: Omits the setter of a `Property<T>` field
//! - `skip`: Excludes the field from the binding metadata

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Ident, LitStr, Type};

/// Derive `DataSource` and `Navigable` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use horizon_presentation::{DataSource, Property};
///
/// #[derive(DataSource)]
/// struct Person {
///     name: Property<String>,
///     age: u32,
/// }
///
/// Person::register_type();
/// ```
#[proc_macro_derive(DataSource, attributes(data_source))]
pub fn derive_data_source(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_derive_data_source(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed member information.
struct MemberField {
    field_name: Ident,
    field_type: Type,
    member_name: String,
    /// The `T` of a `Property<T>` field.
    property_type: Option<Type>,
    navigate: bool,
    read_only: bool,
}

fn impl_derive_data_source(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "DataSource derive does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "DataSource derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "DataSource derive only supports structs",
            ))
        }
    };

    let mut members = Vec::new();
    for field in fields {
        if let Some(member) = parse_member_field(field)? {
            members.push(member);
        }
    }

    let member_entries = members.iter().map(|member| generate_member(struct_name, member));

    Ok(quote! {
        impl ::horizon_presentation::binding::DataSource for #struct_name {
            fn type_info() -> ::horizon_presentation::binding::TypeInfo {
                ::horizon_presentation::binding::TypeInfo::of::<#struct_name>()
                    #(.with_member(#member_entries))*
            }
        }

        impl ::horizon_presentation::property::Navigable for #struct_name {
            type Target = #struct_name;

            fn navigate(&self, f: &mut dyn FnMut(&dyn ::std::any::Any)) {
                f(self);
            }
        }
    })
}

/// Parse a field and its `#[data_source(...)]` attributes.
fn parse_member_field(field: &Field) -> syn::Result<Option<MemberField>> {
    let Some(field_name) = field.ident.clone() else {
        return Ok(None);
    };

    let mut rename = None;
    let mut navigate = false;
    let mut read_only = false;
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("data_source") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                rename = Some(name.value());
            } else if meta.path.is_ident("navigate") {
                navigate = true;
            } else if meta.path.is_ident("read_only") {
                read_only = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else {
                return Err(meta.error("unknown data_source attribute"));
            }
            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }

    let member_name = rename.unwrap_or_else(|| to_pascal_case(&field_name.to_string()));
    Ok(Some(MemberField {
        property_type: property_inner_type(&field.ty),
        field_type: field.ty.clone(),
        field_name,
        member_name,
        navigate,
        read_only,
    }))
}

/// Extract `T` from `Property<T>`.
fn property_inner_type(ty: &Type) -> Option<Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Property" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(syn::GenericArgument::Type(inner)) => Some(inner.clone()),
        _ => None,
    }
}

fn to_pascal_case(name: &str) -> String {
    name.trim_start_matches("r#")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Generate the `MemberInfo` expression for one field.
fn generate_member(struct_name: &Ident, member: &MemberField) -> TokenStream2 {
    let field_name = &member.field_name;
    let field_type = &member.field_type;
    let member_name = &member.member_name;

    let mut info = match &member.property_type {
        Some(value_type) => {
            let getter = quote! {
                ::horizon_presentation::binding::MemberInfo::property::<#value_type>(
                    #member_name,
                    |source| {
                        source
                            .downcast_ref::<#struct_name>()
                            .map(|typed| ::std::boxed::Box::new(typed.#field_name.get()) as ::std::boxed::Box<dyn ::std::any::Any>)
                    },
                )
            };
            if member.read_only {
                getter
            } else {
                quote! {
                    #getter.with_setter(
                        |source, value| {
                            match (source.downcast_ref::<#struct_name>(), value.downcast::<#value_type>()) {
                                (::std::option::Option::Some(typed), ::std::result::Result::Ok(value)) => {
                                    typed.#field_name.store(*value);
                                    true
                                }
                                _ => false,
                            }
                        },
                    )
                }
            }
        }
        None => quote! {
            ::horizon_presentation::binding::MemberInfo::field::<#field_type>(
                #member_name,
                |source| {
                    source
                        .downcast_ref::<#struct_name>()
                        .map(|typed| ::std::boxed::Box::new(::std::clone::Clone::clone(&typed.#field_name)) as ::std::boxed::Box<dyn ::std::any::Any>)
                },
            )
        },
    };

    if member.navigate {
        info = quote! {
            #info.with_navigation::<<#field_type as ::horizon_presentation::property::Navigable>::Target>(
                |source, f| {
                    if let ::std::option::Option::Some(typed) = source.downcast_ref::<#struct_name>() {
                        ::horizon_presentation::property::Navigable::navigate(&typed.#field_name, f);
                    }
                },
            )
        };
    }

    info
}
