use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Lit, Meta,
    NestedMeta, PathArguments, Type,
};

struct Attr {
    key: String,
    value: String,
}

struct CommandOption {
    field: Ident,
    name: String,
    required: bool,
    getter: proc_macro2::TokenStream,
    kind: proc_macro2::TokenStream,
    description: String,
}

fn get_attr_value(attrs: &[Attr], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|a| a.key == name)
        .map(|a| a.value.clone())
}

fn get_attr_list(attrs: &[Attribute]) -> syn::Result<Vec<Attr>> {
    let attr = match attrs.iter().find(|a| a.path.is_ident("cmd")) {
        Some(a) => a,
        None => return Ok(Vec::new()),
    };
    let list = match attr.parse_meta()? {
        Meta::List(list) => list,
        other => return Err(syn::Error::new_spanned(other, "Expected #[cmd(...)]")),
    };
    list.nested
        .into_iter()
        .map(|nested| match nested {
            NestedMeta::Meta(Meta::NameValue(nv)) => {
                let key = nv
                    .path
                    .get_ident()
                    .ok_or_else(|| syn::Error::new_spanned(&nv.path, "Expected identifier"))?
                    .to_string();
                let value = match nv.lit {
                    Lit::Str(s) => s.value(),
                    other => return Err(syn::Error::new_spanned(other, "Expected string")),
                };
                Ok(Attr { key, value })
            }
            other => Err(syn::Error::new_spanned(other, "Expected key = \"value\"")),
        })
        .collect()
}

/// Unwraps `Option<T>` into `(T, false)`, anything else into `(ty, true)`.
fn strip_option(ty: &Type) -> syn::Result<(&Type, bool)> {
    if let Type::Path(path) = ty {
        let segs = &path.path.segments;
        if segs.len() == 1 && segs[0].ident == "Option" {
            if let PathArguments::AngleBracketed(args) = &segs[0].arguments {
                if let Some(GenericArgument::Type(inner)) = args.args.first() {
                    return Ok((inner, false));
                }
            }
            return Err(syn::Error::new_spanned(ty, "Invalid option"));
        }
    }
    Ok((ty, true))
}

fn analyze_field(ident: &Ident, ty: &Type, attrs: &[Attribute]) -> syn::Result<CommandOption> {
    let attrs = get_attr_list(attrs)?;
    let name = get_attr_value(&attrs, "name").unwrap_or_else(|| ident.to_string());
    let desc = get_attr_value(&attrs, "desc").unwrap_or_else(|| ident.to_string());
    let (ty, required) = strip_option(ty)?;

    let type_name = match ty {
        Type::Path(path) => path
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect::<Vec<_>>()
            .join("::"),
        _ => return Err(syn::Error::new_spanned(ty, "Unsupported type")),
    };
    let opt_value = quote!(
        serenity::model::application::interaction::application_command::CommandDataOptionValue
    );
    let opt_type = quote!(serenity::model::application::command::CommandOptionType);
    let (matcher, value, kind) = match type_name.as_str() {
        "String" | "std::string::String" => (
            quote!(#opt_value::String(v)),
            quote!(v.clone()),
            quote!(#opt_type::String),
        ),
        "i64" => (
            quote!(#opt_value::Integer(v)),
            quote!(*v),
            quote!(#opt_type::Integer),
        ),
        "bool" => (
            quote!(#opt_value::Boolean(v)),
            quote!(*v),
            quote!(#opt_type::Boolean),
        ),
        other => {
            return Err(syn::Error::new_spanned(
                ty,
                format!("Unsupported option type {other}"),
            ))
        }
    };

    let find_opt = quote!(opts
        .options
        .iter()
        .find(|o| o.name == #name)
        .and_then(|o| o.resolved.as_ref()));
    let getter = if required {
        quote!(match #find_opt {
            Some(#matcher) => #value,
            _ => return Err(anyhow::anyhow!("Missing value for option {}", #name)),
        })
    } else {
        quote!(match #find_opt {
            Some(#matcher) => Some(#value),
            _ => None,
        })
    };
    Ok(CommandOption {
        field: ident.clone(),
        name,
        required,
        getter,
        kind,
        description: desc,
    })
}

impl CommandOption {
    fn create(&self) -> proc_macro2::TokenStream {
        let name = &self.name;
        let desc = &self.description;
        let kind = &self.kind;
        let required = self.required;
        quote!(.create_option(|opt| {
            opt.name(#name)
                .description(#desc)
                .kind(#kind)
                .required(#required);
            (&extras)(#name, opt);
            opt
        }))
    }
}

fn derive(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let DeriveInput {
        ident,
        generics,
        data,
        attrs,
        ..
    } = input;
    if !generics.params.is_empty() {
        return Err(syn::Error::new(
            ident.span(),
            "Generic structs are not supported",
        ));
    }
    let attrs = get_attr_list(&attrs)?;
    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(f) => f.named.into_iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new(
                    ident.span(),
                    "Derive target must use named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                ident.span(),
                "Derive target must be a struct",
            ))
        }
    };
    let name = get_attr_value(&attrs, "name").unwrap_or_else(|| ident.to_string().to_lowercase());
    let desc = get_attr_value(&attrs, "desc").unwrap_or_else(|| name.clone());
    let opts = fields
        .iter()
        .map(|f| {
            let field_ident = f
                .ident
                .as_ref()
                .ok_or_else(|| syn::Error::new_spanned(f, "Unnamed field"))?;
            analyze_field(field_ident, &f.ty, &f.attrs)
        })
        .collect::<syn::Result<Vec<_>>>()?;
    let builders = opts.iter().map(CommandOption::create);
    let field_names = opts.iter().map(|o| &o.field);
    let getters = opts.iter().map(|o| &o.getter);
    let runner_ident = Ident::new(&format!("__{}_runner", &ident), Span::call_site());
    let app_command = quote!(serenity::model::application::interaction::application_command);
    let data_ident = quote!(<#ident as serenity_command::BotCommand>::Data);

    Ok(quote!(
        impl<'a> TryFrom<&'a #app_command::CommandData> for #ident {
            type Error = anyhow::Error;

            #[allow(unused_variables)]
            fn try_from(opts: &'a #app_command::CommandData) -> anyhow::Result<Self> {
                Ok(#ident {
                    #(#field_names: #getters),*
                })
            }
        }

        #[allow(non_camel_case_types)]
        struct #runner_ident;

        #[serenity::async_trait]
        impl serenity_command::CommandRunner<#data_ident> for #runner_ident {
            async fn run(
                &self,
                data: &#data_ident,
                ctx: &serenity::prelude::Context,
                interaction: &#app_command::ApplicationCommandInteraction,
            ) -> anyhow::Result<serenity_command::CommandResponse> {
                let command = #ident::try_from(&interaction.data)?;
                serenity_command::BotCommand::run(command, data, ctx, interaction).await
            }

            fn name(&self) -> &'static str {
                #name
            }

            fn register<'a>(
                &self,
                builder: &'a mut serenity::builder::CreateApplicationCommand,
            ) -> &'a mut serenity::builder::CreateApplicationCommand {
                <#ident as serenity_command::CommandBuilder<'_>>::create_extras(
                    builder,
                    <#ident as serenity_command::BotCommand>::setup_options,
                );
                let permissions = <#ident as serenity_command::BotCommand>::PERMISSIONS;
                if !permissions.is_empty() {
                    builder.default_member_permissions(permissions);
                }
                builder
            }
        }

        impl<'a> serenity_command::CommandBuilder<'a> for #ident {
            #[allow(unused_variables)]
            fn create_extras<E: Fn(&'static str, &mut serenity::builder::CreateApplicationCommandOption)>(
                builder: &mut serenity::builder::CreateApplicationCommand,
                extras: E,
            ) -> &mut serenity::builder::CreateApplicationCommand {
                builder.name(#name)
                    .description(#desc)
                    #(#builders)*
            }

            fn create(
                builder: &mut serenity::builder::CreateApplicationCommand,
            ) -> &mut serenity::builder::CreateApplicationCommand {
                let extras = |_: &'static str, _: &mut serenity::builder::CreateApplicationCommandOption| {};
                Self::create_extras(builder, extras)
            }

            const NAME: &'static str = #name;

            fn runner() -> Box<dyn serenity_command::CommandRunner<Self::Data> + Send + Sync> {
                Box::new(#runner_ident)
            }
        }
    ))
}

#[proc_macro_derive(Command, attributes(cmd))]
pub fn derive_serenity_command(input: TokenStream) -> TokenStream {
    derive(parse_macro_input!(input))
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
