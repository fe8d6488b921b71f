use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

const NAMED_FIELDS_ONLY: &str = "FormModel derive requires a struct with named fields";
const STRUCTS_ONLY: &str = "FormModel derive is only supported on structs";

#[proc_macro_derive(FormModel, attributes(form))]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.ident,
            "FormModel derive currently supports only non-generic structs",
        ));
    }

    let vis = input.vis;
    let model_ident = input.ident;
    let fields_struct_ident = format_ident!("{model_ident}Fields");

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            Fields::Unnamed(fields) => {
                return Err(syn::Error::new_spanned(fields, NAMED_FIELDS_ONLY));
            }
            Fields::Unit => {
                return Err(syn::Error::new_spanned(data.struct_token, NAMED_FIELDS_ONLY));
            }
        },
        Data::Enum(data) => {
            return Err(syn::Error::new_spanned(data.enum_token, STRUCTS_ONLY));
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(data.union_token, STRUCTS_ONLY));
        }
    };

    let calmform = calmform_path();
    let form = quote!(#calmform::form);
    let mut lens_defs = Vec::new();
    let mut fields_methods = Vec::new();
    let mut keys = Vec::new();
    let mut labels = Vec::new();
    let mut into_values = Vec::new();
    let mut from_values = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_ty = field.ty;
        let field_name = field_ident.to_string();
        let lens_ident = format_ident!("{model_ident}{}Lens", to_pascal_case(&field_name));

        if let Some(label) = field_label(&field.attrs)? {
            labels.push(quote! { #field_name => ::core::option::Option::Some(#label), });
        }

        lens_defs.push(quote! {
            #[allow(dead_code)]
            #[derive(Clone, Copy, Debug, Default)]
            #vis struct #lens_ident;

            impl #form::FieldLens for #lens_ident {
                type Model = #model_ident;
                type Value = #field_ty;

                fn key(self) -> #form::FieldKey {
                    #form::FieldKey::new(#field_name)
                }

                fn get<'a>(self, model: &'a #model_ident) -> &'a Self::Value {
                    &model.#field_ident
                }

                fn set(self, model: &mut #model_ident, value: Self::Value) {
                    model.#field_ident = value;
                }
            }
        });

        fields_methods.push(quote! {
            pub const fn #field_ident(&self) -> #lens_ident {
                #lens_ident
            }
        });

        keys.push(quote! { #form::FieldKey::new(#field_name) });
        into_values.push(quote! {
            (
                #form::FieldKey::new(#field_name),
                ::core::convert::Into::<#form::Value>::into(self.#field_ident),
            )
        });
        from_values.push(quote! {
            #field_ident: #form::model_field::<#field_ty>(values, #field_name)?
        });
    }

    let label_fn = if labels.is_empty() {
        quote!()
    } else {
        quote! {
            fn field_label(key: &str) -> ::core::option::Option<&'static str> {
                match key {
                    #(#labels)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    };

    Ok(quote! {
        #[derive(Clone, Copy, Debug, Default)]
        #vis struct #fields_struct_ident;

        #[allow(dead_code)]
        impl #fields_struct_ident {
            #(#fields_methods)*
        }

        impl #form::FormModel for #model_ident {
            type Fields = #fields_struct_ident;

            fn fields() -> Self::Fields {
                #fields_struct_ident
            }

            fn field_keys() -> ::std::vec::Vec<#form::FieldKey> {
                ::std::vec![#(#keys),*]
            }

            #label_fn

            fn into_values(self) -> ::std::vec::Vec<(#form::FieldKey, #form::Value)> {
                ::std::vec![#(#into_values),*]
            }

            fn from_values(
                values: &#form::FieldValues<#form::Value>,
            ) -> ::core::result::Result<Self, #form::ModelError> {
                ::core::result::Result::Ok(Self {
                    #(#from_values),*
                })
            }
        }

        #(#lens_defs)*
    })
}

/// Reads `#[form(label = "...")]`.
fn field_label(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut label = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("form")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("label") {
                label = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported form attribute, expected `label`"))
            }
        })?;
    }
    Ok(label)
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

fn to_pascal_case(input: &str) -> String {
    let mut out = String::new();
    for segment in input.split('_') {
        if segment.is_empty() {
            continue;
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
