//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations.
//! Replacement for the `thiserror` crate.
//!
//! # Usage
//!
//! ```ignore
//! use bytevm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VMError {
//!     #[error("division by zero")]
//!     DivisionByZero,
//!
//!     #[error("undefined opcode {0:#04x}")]
//!     UndefinedOpcode(u8),
//!
//!     #[error("stack overflow: pushing {requested} bytes onto {used}/{capacity}")]
//!     StackOverflow { requested: u32, used: u32, capacity: u32 },
//! }
//! ```
//!
//! Each variant (or the whole struct) declares its display message with an
//! `#[error("...")]` attribute. Tuple fields interpolate as `{0}`, `{1}`;
//! named fields as `{field_name}`. Format specs (`{0:#04x}`) pass through.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

/// Derives `Display` and `Error` for an enum or struct.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let display_body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = error_message(&variant.attrs, ident)?;
                    let (pattern, write) = variant_arm(&variant.fields, &message);
                    Ok(quote! { Self::#ident #pattern => #write, })
                })
                .collect::<syn::Result<Vec<_>>>()?;

            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = error_message(&input.attrs, &input.ident)?;
            struct_body(&data.fields, &message)
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display_body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds the match pattern and `write!` call for one enum variant.
fn variant_arm(
    fields: &Fields,
    message: &str,
) -> (proc_macro2::TokenStream, proc_macro2::TokenStream) {
    match fields {
        Fields::Unit => (quote! {}, quote! { write!(f, #message) }),
        Fields::Unnamed(unnamed) => {
            let bindings: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let format_str = positional_to_named(message, unnamed.unnamed.len());
            (
                quote! { ( #(#bindings),* ) },
                quote! { write!(f, #format_str, #(#bindings = #bindings),*) },
            )
        }
        Fields::Named(named) => {
            let bindings: Vec<_> = named.named.iter().map(|field| &field.ident).collect();
            (
                quote! { { #(#bindings),* } },
                quote! { write!(f, #message, #(#bindings = #bindings),*) },
            )
        }
    }
}

/// Builds the `Display` body for a struct, reading fields through `self`.
fn struct_body(fields: &Fields, message: &str) -> proc_macro2::TokenStream {
    match fields {
        Fields::Unit => quote! { write!(f, #message) },
        Fields::Unnamed(unnamed) => {
            let bindings: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let indices: Vec<_> = (0..unnamed.unnamed.len()).map(syn::Index::from).collect();
            let format_str = positional_to_named(message, unnamed.unnamed.len());
            quote! { write!(f, #format_str, #(#bindings = self.#indices),*) }
        }
        Fields::Named(named) => {
            let bindings: Vec<_> = named.named.iter().map(|field| &field.ident).collect();
            quote! { write!(f, #message, #(#bindings = self.#bindings),*) }
        }
    }
}

/// Extracts the message from an `#[error("...")]` attribute.
fn error_message<T: quote::ToTokens>(attrs: &[syn::Attribute], target: &T) -> syn::Result<String> {
    for attr in attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        let Meta::List(list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")] to describe the error",
            ));
        };
        let lit = syn::parse2::<Lit>(list.tokens.clone()).map_err(|_| {
            syn::Error::new_spanned(
                &attr.meta,
                "failed to parse #[error] attribute; expected a string literal like #[error(\"division by zero\")]",
            )
        })?;
        if let Lit::Str(lit_str) = lit {
            return Ok(lit_str.value());
        }
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "invalid #[error] attribute: message must be a string literal",
        ));
    }

    Err(syn::Error::new_spanned(
        target,
        "missing #[error(\"...\")] attribute; every error variant must declare a display message",
    ))
}

/// Converts positional format args `{0}`, `{1}` to named args `{f0}`, `{f1}`,
/// preserving any format spec (`{0:#04x}` becomes `{f0:#04x}`).
fn positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result.replace(&format!("{{{i}}}"), &format!("{{f{i}}}"));
        result = result.replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    result
}
