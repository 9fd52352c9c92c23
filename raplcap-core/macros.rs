//! Declarative macros to reduce boilerplate across the raplcap codebase

/// Define a power zone enum with its register table
///
/// Each variant maps to a display name, its power limit MSR, its energy
/// status MSR, and whether the zone defines a short term constraint.
///
/// # Example
/// ```
/// use raplcap::zone_table;
///
/// zone_table! {
///     pub enum Domain {
///         Package => ("PACKAGE", 0x610, 0x611, true),
///         Dram => ("DRAM", 0x618, 0x619, false),
///     }
/// }
///
/// let domain = Domain::Dram;
/// assert_eq!(domain.name(), "DRAM");
/// assert_eq!(domain.power_limit_msr(), 0x618);
/// assert!(!domain.has_short_term());
/// assert_eq!(Domain::all().len(), 2);
/// ```
///
/// Expands to:
/// - An enum with Debug, Clone, Copy, PartialEq, Eq, Hash derives
/// - `name()`, `power_limit_msr()`, `energy_status_msr()` and `has_short_term()`
/// - An `all() -> Vec<Self>` method listing variants in declaration order
#[macro_export]
macro_rules! zone_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => ($str:literal, $limit:expr, $energy:expr, $short:expr)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn power_limit_msr(&self) -> u64 {
                match self {
                    $($name::$variant => $limit,)*
                }
            }

            pub fn energy_status_msr(&self) -> u64 {
                match self {
                    $($name::$variant => $energy,)*
                }
            }

            pub fn has_short_term(&self) -> bool {
                match self {
                    $($name::$variant => $short,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}
