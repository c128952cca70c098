mod decode_field;
mod record_trait;

use decode_field::decode_field;
use proc_macro::TokenStream;
use record_trait::record_trait;
use syn::{Fields, ItemStruct, parse_macro_input};

#[proc_macro_derive(Record, attributes(ksql, tablename))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let Fields::Named(..) = item.fields else {
        panic!(
            "Record can only be derived for structs with named fields, `{}` is not one",
            item.ident
        );
    };
    let fields: Vec<_> = item.fields.iter().map(decode_field).collect();
    record_trait(&item, &fields).into()
}
