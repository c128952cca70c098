use crate::decode_field::FieldMetadata;
use proc_macro2::TokenStream;
use quote::quote;
use syn::ItemStruct;

fn optional_str(value: &Option<String>) -> TokenStream {
    match value {
        Some(v) => quote!(Some(#v)),
        None => quote!(None),
    }
}

pub(crate) fn record_trait(item: &ItemStruct, fields: &[FieldMetadata]) -> TokenStream {
    let name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();
    let len = fields.len();
    let decls = fields.iter().map(|f| {
        let ident = f.ident.to_string();
        let tag = optional_str(&f.tag);
        let table_alias = optional_str(&f.table_alias);
        quote! {
            ::ksql::FieldDecl {
                ident: #ident,
                tag: #tag,
                table_alias: #table_alias,
            }
        }
    });
    // Same rule as the resolver: any ksql tag makes the struct plain
    let nested = fields.iter().all(|f| f.tag.is_none());
    let columns: Vec<_> = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.tag.is_some())
        .collect();
    let encode = columns.iter().map(|(i, f)| {
        let field = &f.ident;
        if f.json {
            quote!(#i => ::ksql::encode_json(&self.#field),)
        } else {
            quote!(#i => ::ksql::encode_value(&self.#field),)
        }
    });
    let decode = columns.iter().map(|(i, f)| {
        let field = &f.ident;
        if f.json {
            quote!(#i => ::ksql::decode_json(&mut self.#field, value),)
        } else {
            quote!(#i => ::ksql::decode_value(&mut self.#field, value),)
        }
    });
    let nested_methods = if nested {
        let tables: Vec<_> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.table_alias.is_some())
            .collect();
        let nested_field = tables.iter().map(|(i, f)| {
            let field = &f.ident;
            quote!(#i => Some(&mut self.#field as &mut dyn ::ksql::Record),)
        });
        let nested_info = tables.iter().map(|(i, f)| {
            let ty = &f.ty;
            quote!(#i => Some(cache.resolve::<#ty>()),)
        });
        quote! {
            fn nested_field(&mut self, index: usize) -> Option<&mut dyn ::ksql::Record> {
                match index {
                    #(#nested_field)*
                    _ => None,
                }
            }

            fn nested_struct_info(
                cache: &::ksql::StructInfoCache,
                index: usize,
            ) -> Option<::ksql::Result<::std::sync::Arc<::ksql::StructInfo>>> {
                match index {
                    #(#nested_info)*
                    _ => None,
                }
            }
        }
    } else {
        TokenStream::new()
    };
    quote! {
        impl #impl_generics ::ksql::Record for #name #ty_generics #where_clause {
            fn declared_fields() -> &'static [::ksql::FieldDecl] {
                static FIELDS: [::ksql::FieldDecl; #len] = [#(#decls),*];
                &FIELDS
            }

            #[allow(unused_variables)]
            fn encode_field(&self, index: usize) -> ::ksql::Result<::ksql::Value> {
                match index {
                    #(#encode)*
                    _ => Err(::ksql::unmapped_field::<Self>(index)),
                }
            }

            #[allow(unused_variables)]
            fn decode_field(
                &mut self,
                index: usize,
                value: ::ksql::Value,
            ) -> ::ksql::Result<()> {
                match index {
                    #(#decode)*
                    _ => Err(::ksql::unmapped_field::<Self>(index)),
                }
            }

            #nested_methods
        }
    }
}
