// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use proc_macro2::TokenStream;
use quote::format_ident;
use quote::quote;
use syn::DeriveInput;
use syn::Fields;
use syn::Ident;
use syn::parse_macro_input;
use syn::spanned::Spanned;

/// Generate a [`tap_pmd::stat::StatProvider`] implementation given a
/// struct of named fields of type [`tap_pmd::stat::StatU64`].
///
/// ```ignore
/// #[derive(StatProvider)]
/// struct RxStats {
///     ipackets: StatU64,
///     ibytes: StatU64,
/// }
/// ```
///
/// Along with the trait implementation, a plain `RxStatsSnap` struct
/// of `u64` fields is generated to hold point-in-time copies.
#[proc_macro_derive(StatProvider)]
pub fn derive_stat_provider(
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let input: DeriveInput = parse_macro_input!(input);
    match expand(input) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let DeriveInput { ident, data, vis, .. } = input;

    let syn::Data::Struct(s) = data else {
        return Err(syn::Error::new(
            ident.span(),
            "only a struct may be a StatProvider",
        ));
    };

    let named = match s.fields {
        Fields::Named(named) => named.named,
        other => {
            return Err(syn::Error::new(
                other.span(),
                "a StatProvider must have named fields",
            ));
        }
    };

    let num_fields = named.len() as u32;
    let fields: Vec<Ident> =
        named.into_iter().filter_map(|f| f.ident).collect();
    let ident_snap = format_ident!("{}Snap", ident);

    Ok(quote! {
        #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
        #vis struct #ident_snap {
            #( pub #fields: u64, )*
        }

        impl ::tap_pmd::stat::StatProvider for #ident {
            const NUM_FIELDS: u32 = #num_fields;
            type Snap = #ident_snap;

            fn new() -> Self {
                use ::tap_pmd::stat::StatU64;

                Self {
                    #( #fields: StatU64::new(), )*
                }
            }

            fn snapshot(&self) -> Self::Snap {
                #ident_snap {
                    #( #fields: self.#fields.val(), )*
                }
            }

            fn reset(&mut self) {
                #( self.#fields.set(0); )*
            }
        }
    })
}
