use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Ident, Type, Visibility};

pub fn derive_record_impl(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match RecordDescription::parse(&input) {
        Ok(description) => description.expand().into(),
        Err(e) => e.into_compile_error().into(),
    }
}

/// Everything we need to know about a `#[derive(Record)]` struct
struct RecordDescription {
    name: Ident,
    vis: Visibility,
    key: Field,
    // fields that can be overridden by a patch
    patch_fields: Vec<Field>,
}

#[derive(Default)]
struct FieldFlags {
    key: bool,
    skip: bool,
}

impl RecordDescription {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let name = input.ident.clone();
        if !input.generics.params.is_empty() {
            return Err(syn::Error::new_spanned(&input.generics, "generic records are not supported"));
        }

        let fields = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(fields) => fields.named.clone(),
                fields => return Err(syn::Error::new_spanned(fields, "Only named fields are supported")),
            },
            _ => return Err(syn::Error::new_spanned(&name, "Only structs are supported")),
        };

        let mut key = None;
        let mut patch_fields = Vec::new();
        for field in fields.into_iter() {
            let flags = field_flags(&field)?;
            if flags.key {
                if key.is_some() {
                    return Err(syn::Error::new_spanned(&field, "only one field can be marked #[record(key)]"));
                }
                key = Some(field);
            } else if !flags.skip {
                patch_fields.push(field);
            }
        }

        let key = key.ok_or_else(|| syn::Error::new_spanned(&name, "a Record needs one field marked #[record(key)]"))?;
        Ok(Self { name, vis: input.vis.clone(), key, patch_fields })
    }

    fn patch_name(&self) -> Ident { format_ident!("{}Patch", self.name) }

    fn patch_field_names(&self) -> Vec<&Ident> { self.patch_fields.iter().filter_map(|f| f.ident.as_ref()).collect() }

    fn patch_field_types(&self) -> Vec<&Type> { self.patch_fields.iter().map(|f| &f.ty).collect() }

    fn patch_field_visibility(&self) -> Vec<&Visibility> { self.patch_fields.iter().map(|f| &f.vis).collect() }

    fn expand(&self) -> TokenStream {
        let patch = self.patch_struct();
        let record = self.record_impl();
        quote! {
            #patch
            #record
        }
    }

    fn patch_struct(&self) -> TokenStream {
        let vis = &self.vis;
        let patch_name = self.patch_name();
        let field_names = self.patch_field_names();
        let field_types = self.patch_field_types();
        let field_vis = self.patch_field_visibility();
        let doc = format!("Sparse overrides for [`{}`]. Unset fields are left untouched when merged.", self.name);

        quote! {
            #[doc = #doc]
            #[derive(Debug, Clone, Default)]
            #vis struct #patch_name {
                #( #field_vis #field_names: ::std::option::Option<#field_types>, )*
            }

            impl #patch_name {
                pub fn new() -> Self { ::std::default::Default::default() }

                #(
                    pub fn #field_names(mut self, value: impl ::std::convert::Into<#field_types>) -> Self {
                        self.#field_names = ::std::option::Option::Some(value.into());
                        self
                    }
                )*
            }

            impl ::optimist::Patch for #patch_name {
                fn is_empty(&self) -> bool {
                    true #( && self.#field_names.is_none() )*
                }
            }
        }
    }

    fn record_impl(&self) -> TokenStream {
        let name = &self.name;
        let patch_name = self.patch_name();
        let key_name = &self.key.ident;
        let key_type = &self.key.ty;
        let field_names = self.patch_field_names();

        quote! {
            impl ::optimist::Record for #name {
                type Key = #key_type;
                type Patch = #patch_name;

                fn key(&self) -> Self::Key { ::std::clone::Clone::clone(&self.#key_name) }

                fn apply_patch(&mut self, patch: &Self::Patch) {
                    #(
                        if let ::std::option::Option::Some(value) = &patch.#field_names {
                            self.#field_names = ::std::clone::Clone::clone(value);
                        }
                    )*
                }
            }
        }
    }
}

fn field_flags(field: &Field) -> syn::Result<FieldFlags> {
    let mut flags = FieldFlags::default();
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("record")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                flags.key = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                flags.skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `key` or `skip`"))
            }
        })?;
    }
    if flags.key && flags.skip {
        return Err(syn::Error::new_spanned(field, "the key field cannot also be skipped"));
    }
    Ok(flags)
}
