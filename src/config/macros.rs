/// Configuration macros for zero-repetition config definitions
///
/// `config_struct!` declares a config section with its defaults in one place
/// and generates:
/// - the struct with public fields and serde support (`#[serde(default)]`)
/// - the `Default` implementation
/// - `FIELDS`, the list of TOML keys the section accepts
///
/// ```
/// swapengine::config_struct! {
///     pub struct GasExample {
///         swap_gas_limit: u64 = 250_000,
///         use_network_gas_price: bool = true,
///     }
/// }
/// assert_eq!(GasExample::FIELDS, &["swap_gas_limit", "use_network_gas_price"]);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }

        impl $name {
            /// TOML keys accepted by this section
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field_name)),*];
        }
    };
}
