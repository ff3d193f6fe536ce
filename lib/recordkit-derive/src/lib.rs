use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input, spanned::Spanned};

const CASTS: [(&str, &str); 4] = [
    ("number", "Number"),
    ("boolean", "Boolean"),
    ("date", "Date"),
    ("json", "Json"),
];

#[derive(Default)]
struct ModelAttrs {
    table: Option<String>,
    primary_key: Option<String>,
    fillable: Vec<String>,
    guarded: Vec<String>,
    hidden: Vec<String>,
    casts: Vec<(String, syn::Ident)>,
    soft_delete: Option<String>,
}

/// Parse a column list such as `fillable(name, email)`
fn parse_columns(meta: &syn::meta::ParseNestedMeta, out: &mut Vec<String>) -> syn::Result<()> {
    meta.parse_nested_meta(|column| {
        match column.path.get_ident() {
            Some(ident) => out.push(ident.to_string()),
            None => return Err(column.error("expected a column name")),
        }
        Ok(())
    })
}

/// Parse `casts(column = "number", ...)`.
fn parse_casts(
    meta: &syn::meta::ParseNestedMeta,
    out: &mut Vec<(String, syn::Ident)>,
) -> syn::Result<()> {
    meta.parse_nested_meta(|cast| {
        let column = cast
            .path
            .get_ident()
            .ok_or_else(|| cast.error("expected a column name"))?
            .to_string();
        let kind: LitStr = cast.value()?.parse()?;
        let variant = CASTS
            .iter()
            .find(|(name, _)| *name == kind.value())
            .map(|(_, variant)| syn::Ident::new(variant, kind.span()))
            .ok_or_else(|| {
                syn::Error::new(
                    kind.span(),
                    "cast must be one of \"number\", \"boolean\", \"date\", \"json\"",
                )
            })?;
        out.push((column, variant));
        Ok(())
    })
}

/// Parse the #[model(...)] attribute
fn parse_model_attrs(input: &DeriveInput) -> syn::Result<ModelAttrs> {
    let mut attrs = ModelAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                attrs.table = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("primary_key") {
                attrs.primary_key = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("fillable") {
                parse_columns(&meta, &mut attrs.fillable)?;
            } else if meta.path.is_ident("guarded") {
                parse_columns(&meta, &mut attrs.guarded)?;
            } else if meta.path.is_ident("hidden") {
                parse_columns(&meta, &mut attrs.hidden)?;
            } else if meta.path.is_ident("casts") {
                parse_casts(&meta, &mut attrs.casts)?;
            } else if meta.path.is_ident("soft_delete") {
                let column = if meta.input.peek(syn::Token![=]) {
                    meta.value()?.parse::<LitStr>()?.value()
                } else {
                    "deleted_at".to_string()
                };
                attrs.soft_delete = Some(column);
            } else {
                return Err(meta.error("unsupported model attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// Derive macro for the `Model` schema trait.
///
/// ## Attributes
///
/// - `table = "..."` - table name (required)
/// - `primary_key = "..."` - key column, default `id`
/// - `fillable(a, b)` - columns accepted by mass assignment
/// - `guarded(a, b)` - columns rejected by mass assignment (ignored when `fillable` is set)
/// - `hidden(a, b)` - columns left out of `to_json`
/// - `casts(col = "number" | "boolean" | "date" | "json")`
/// - `soft_delete` or `soft_delete = "column"` - mark rows deleted via a
///   timestamp column (default `deleted_at`); also implements `SoftDeletes`
///
/// ## Example
///
/// ```text
/// #[derive(Model)]
/// #[model(table = "posts", fillable(title, body), casts(meta = "json"), soft_delete)]
/// struct Post;
/// // Use: let post = Record::<Post>::find(&db, 1).await?;
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_model(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_model(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let attrs = parse_model_attrs(input)?;

    let table = attrs.table.ok_or_else(|| {
        syn::Error::new(
            input.span(),
            "Model requires #[model(table = \"...\")]",
        )
    })?;

    let primary_key = attrs.primary_key.map(|pk| {
        quote! {
            fn primary_key() -> &'static str {
                #pk
            }
        }
    });

    let column_list = |method: &str, columns: &[String]| {
        if columns.is_empty() {
            return quote! {};
        }
        let method = syn::Ident::new(method, proc_macro2::Span::call_site());
        quote! {
            fn #method() -> &'static [&'static str] {
                &[#(#columns),*]
            }
        }
    };
    let fillable = column_list("fillable", &attrs.fillable);
    let guarded = column_list("guarded", &attrs.guarded);
    let hidden = column_list("hidden", &attrs.hidden);

    let casts = if attrs.casts.is_empty() {
        quote! {}
    } else {
        let entries = attrs.casts.iter().map(|(column, variant)| {
            quote! { (#column, ::recordkit::Cast::#variant) }
        });
        quote! {
            fn casts() -> &'static [(&'static str, ::recordkit::Cast)] {
                &[#(#entries),*]
            }
        }
    };

    let (soft_delete_column, soft_deletes_impl) = match &attrs.soft_delete {
        Some(column) => (
            quote! {
                const SOFT_DELETE_COLUMN: ::core::option::Option<&'static str> =
                    ::core::option::Option::Some(#column);
            },
            quote! {
                impl #impl_generics ::recordkit::SoftDeletes for #name #ty_generics #where_clause {}
            },
        ),
        None => (quote! {}, quote! {}),
    };

    Ok(quote! {
        impl #impl_generics ::recordkit::Model for #name #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table
            }

            #primary_key
            #fillable
            #guarded
            #hidden
            #casts
            #soft_delete_column
        }

        #soft_deletes_impl
    })
}
