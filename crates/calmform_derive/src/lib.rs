use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

#[proc_macro_derive(FormField, attributes(form_field))]
pub fn derive_form_field(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormField derive currently supports only non-generic enums",
        )
        .to_compile_error()
        .into();
    }

    let enum_ident = input.ident;
    let variants = match input.data {
        Data::Enum(data) => data.variants,
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormField derive is only supported on enums",
            )
            .to_compile_error()
            .into();
        }
    };

    let calmform = calmform_path();
    let mut all_items = Vec::new();
    let mut name_arms = Vec::new();
    let mut index_arms = Vec::new();

    for (index, variant) in variants.into_iter().enumerate() {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(
                variant.ident,
                "FormField derive requires unit variants",
            )
            .to_compile_error()
            .into();
        }
        let name = match rename_of(&variant.attrs) {
            Ok(Some(rename)) => rename,
            Ok(None) => to_snake_case(&variant.ident.to_string()),
            Err(error) => return error.to_compile_error().into(),
        };
        let variant_ident = variant.ident;

        all_items.push(quote!(#enum_ident::#variant_ident));
        name_arms.push(quote!(#enum_ident::#variant_ident => #name));
        index_arms.push(quote!(#enum_ident::#variant_ident => #index));
    }

    quote! {
        impl #calmform::form::FormField for #enum_ident {
            const ALL: &'static [Self] = &[#(#all_items),*];

            fn name(self) -> &'static str {
                match self {
                    #(#name_arms,)*
                }
            }

            fn index(self) -> usize {
                match self {
                    #(#index_arms,)*
                }
            }
        }
    }
    .into()
}

fn rename_of(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs {
        if !attr.path().is_ident("form_field") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported form_field attribute"))
            }
        })?;
    }
    Ok(rename)
}

fn calmform_path() -> TokenStream2 {
    match crate_name("calmform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::calmform),
    }
}

fn to_snake_case(input: &str) -> String {
    let mut out = String::new();
    for (position, ch) in input.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if position > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
