use super::derived_traits;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::parse::Parser;
use syn::{Data, DeriveInput, Lit, LitStr, Meta, parse_quote};

fn parse_tag(args: TokenStream, input: &DeriveInput) -> syn::Result<LitStr> {
    let parser = syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated;
    let metas = parser.parse2(args)?;
    let mut tag: Option<LitStr> = None;

    for meta in metas {
        let Meta::NameValue(name_value) = meta else {
            return Err(syn::Error::new_spanned(meta, "Expected `tag = \"...\"`"));
        };

        if !name_value.path.is_ident("tag") {
            return Err(syn::Error::new_spanned(
                name_value.path,
                "Only `tag = \"...\"` is supported",
            ));
        }

        if tag.is_some() {
            return Err(syn::Error::new_spanned(name_value, "Duplicate `tag = \"...\"` argument"));
        }

        let mut value = &name_value.value;
        // `$tag:literal` forwarded by `macro_rules!` arrives inside an invisible group.
        while let syn::Expr::Group(group) = value {
            value = &group.expr;
        }
        let syn::Expr::Lit(syn::ExprLit { lit: Lit::Str(lit), .. }) = value else {
            return Err(syn::Error::new_spanned(
                &name_value.value,
                "Expected string literal for `tag = \"...\"`",
            ));
        };

        if lit.value().trim().is_empty() {
            return Err(syn::Error::new_spanned(lit, "Module tag must not be empty"));
        }

        tag = Some(lit.clone());
    }

    Ok(tag.unwrap_or_else(|| LitStr::new(&input.ident.to_string(), Span::call_site())))
}

pub fn expand(args: TokenStream, input: DeriveInput) -> TokenStream {
    if let Data::Union(_) = &input.data {
        return syn::Error::new_spanned(&input.ident, "save_module cannot be applied to unions")
            .to_compile_error();
    }

    let tag = match parse_tag(args, &input) {
        Ok(tag) => tag,
        Err(err) => return err.to_compile_error(),
    };

    let present = derived_traits(&input);
    let mut missing = Vec::new();
    let mut needs_serde_path = false;

    for (name, path) in [
        ("Debug", quote!(Debug)),
        ("Clone", quote!(Clone)),
        ("PartialEq", quote!(PartialEq)),
        ("Serialize", quote!(::yoki_archive::serde::Serialize)),
        ("Deserialize", quote!(::yoki_archive::serde::Deserialize)),
    ] {
        if present.contains(name) {
            continue;
        }
        needs_serde_path |= matches!(name, "Serialize" | "Deserialize");
        missing.push(path);
    }

    let derives = if missing.is_empty() { quote!() } else { quote! { #[derive(#(#missing),*)] } };
    let serde_path =
        if needs_serde_path { quote! { #[serde(crate = "::yoki_archive::serde")] } } else { quote!() };

    let name = &input.ident;
    let mut generics = input.generics.clone();
    let type_params: Vec<_> = generics.type_params().map(|p| p.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for param in type_params {
        where_clause.predicates.push(parse_quote! {
            #param: ::yoki_archive::serde::Serialize
                + ::yoki_archive::serde::de::DeserializeOwned
                + Send
                + Sync
                + 'static
        });
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    quote! {
        #derives
        #serde_path
        #input

        #[automatically_derived]
        impl #impl_generics ::yoki_archive::Module for #name #ty_generics #where_clause {
            const TAG: &'static str = #tag;
        }
    }
}
