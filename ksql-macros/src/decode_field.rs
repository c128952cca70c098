use ksql_core::parse_tag;
use syn::{Attribute, Field, Ident, LitStr, Type};

pub(crate) struct FieldMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    pub(crate) tag: Option<String>,
    pub(crate) table_alias: Option<String>,
    pub(crate) json: bool,
}

fn string_argument(attr: &Attribute, example: &str) -> String {
    let Ok(value) = attr
        .meta
        .require_list()
        .and_then(|v| v.parse_args::<LitStr>())
    else {
        panic!(
            "Error while parsing `{}`, use it like: `{}`",
            attr.path().get_ident().map(ToString::to_string).unwrap_or_default(),
            example
        );
    };
    value.value()
}

pub(crate) fn decode_field(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Field is expected to have a name");
    let mut metadata = FieldMetadata {
        ident,
        ty: field.ty.clone(),
        tag: None,
        table_alias: None,
        json: false,
    };
    for attr in &field.attrs {
        if attr.path().is_ident("ksql") {
            if metadata.tag.is_some() {
                panic!("Field `{}` has more than one `ksql` attribute", metadata.ident);
            }
            let tag = string_argument(attr, "#[ksql(\"column_name,json\")]");
            match parse_tag(&metadata.ident.to_string(), &tag) {
                Ok((_, modifiers)) => metadata.json = modifiers.serialize_as_json,
                Err(e) => panic!("{:#}", e),
            }
            metadata.tag = Some(tag);
        } else if attr.path().is_ident("tablename") {
            if metadata.table_alias.is_some() {
                panic!(
                    "Field `{}` has more than one `tablename` attribute",
                    metadata.ident
                );
            }
            let alias = string_argument(attr, "#[tablename(\"u\")]");
            if alias.trim().is_empty() {
                panic!("Field `{}` has an empty `tablename`", metadata.ident);
            }
            metadata.table_alias = Some(alias);
        }
    }
    metadata
}
