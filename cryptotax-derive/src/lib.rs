use proc_macro::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields, Lit, LitStr, Meta, Token, Type};

/// Derive macro describing the columns an importer reads from an exchange CSV export.
///
/// For each field, in declaration order, it records:
/// - the column name (`#[serde(rename = "...")]` wins over the field name)
/// - whether the column is required (not `Option<T>` and no `#[serde(default)]`)
/// - a description taken from the doc comments
///
/// Fields marked `#[serde(skip)]` are not columns and are left out.
///
/// Generates `csv_columns() -> &'static [CsvColumn]`; `CsvColumn` must be in scope.
#[proc_macro_derive(CsvColumns, attributes(serde))]
pub fn derive_csv_columns(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct Column {
    name: String,
    required: bool,
    description: String,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "CsvColumns requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "CsvColumns can only be derived for structs",
            ))
        }
    };

    let mut columns = Vec::new();
    for field in fields {
        let serde = SerdeField::parse(&field.attrs)?;
        if serde.skip {
            continue;
        }
        let ident = field
            .ident
            .as_ref()
            .map(|i| i.to_string().trim_start_matches("r#").to_string())
            .unwrap_or_default();
        columns.push(Column {
            name: serde.rename.unwrap_or(ident),
            required: !serde.default && !is_option(&field.ty),
            description: doc_comment(&field.attrs),
        });
    }

    let entries = columns.iter().enumerate().map(|(position, column)| {
        let Column {
            name,
            required,
            description,
        } = column;
        quote! {
            CsvColumn {
                position: #position,
                name: #name,
                required: #required,
                description: #description,
            }
        }
    });

    Ok(quote! {
        impl #name {
            pub fn csv_columns() -> &'static [CsvColumn] {
                static COLUMNS: &[CsvColumn] = &[
                    #(#entries),*
                ];
                COLUMNS
            }
        }
    })
}

#[derive(Default)]
struct SerdeField {
    rename: Option<String>,
    default: bool,
    skip: bool,
}

impl SerdeField {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut field = SerdeField::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    field.rename = Some(value.value());
                    Ok(())
                } else if meta.path.is_ident("default") {
                    field.default = true;
                    skip_value(&meta)
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    field.skip = true;
                    Ok(())
                } else {
                    skip_value(&meta)
                }
            })?;
        }
        Ok(field)
    }
}

/// Consume whatever follows a serde option we do not interpret.
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_value(&inner))?;
    }
    Ok(())
}

fn doc_comment(attrs: &[syn::Attribute]) -> String {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}
