/// Declares a persistent object type.
///
/// Generates the struct, its [`Model`](crate::Model) implementation with a
/// property manifest, and one getter/setter pair per field. `#[primary_key]`
/// marks the identifier, whose setter enforces uniqueness once managed.
/// `#[indexed]` marks an indexed property.
///
/// ```ignore
/// store_object! {
///     pub struct Person {
///         #[primary_key]
///         id: i64,
///         name: String,
///         nickname: Option<String>,
///     }
///     links { dog: Dog }
///     lists { friends: Person }
/// }
/// ```
#[macro_export]
macro_rules! store_object {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$($field_meta:tt)*])* $field:ident : $field_ty:ty ),* $(,)?
        }
        $( links { $( $link:ident : $link_ty:ident ),* $(,)? } )?
        $( lists { $( $list:ident : $list_ty:ident ),* $(,)? } )?
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        $vis struct $name {
            core: $crate::ObjectCore,
        }

        impl $crate::Model for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn object_schema() -> $crate::ObjectSchema {
                $crate::ObjectSchema::new(stringify!($name))
                    $(
                        .with_property(
                            $crate::Property::new(
                                stringify!($field),
                                <$field_ty as $crate::PropertyValue>::PROPERTY_TYPE,
                            )
                            .nullable(<$field_ty as $crate::PropertyValue>::NULLABLE)
                            .indexed($crate::__store_field_is_indexed!($(#[$($field_meta)*])*))
                            .primary_key($crate::__store_field_is_primary!($(#[$($field_meta)*])*)),
                        )
                    )*
                    $($(
                        .with_property($crate::Property::link(
                            stringify!($link),
                            stringify!($link_ty),
                        ))
                    )*)?
                    $($(
                        .with_property($crate::Property::list(
                            stringify!($list),
                            stringify!($list_ty),
                        ))
                    )*)?
            }

            fn core(&self) -> &$crate::ObjectCore {
                &self.core
            }

            fn core_mut(&mut self) -> &mut $crate::ObjectCore {
                &mut self.core
            }

            fn from_core(core: $crate::ObjectCore) -> Self {
                Self { core }
            }
        }

        $crate::paste::paste! {
            impl $name {
                /// Creates a standalone instance holding default values.
                pub fn new() -> Self {
                    <Self as $crate::Model>::new_standalone()
                }

                $(
                    pub fn $field(&self) -> $crate::Result<$field_ty> {
                        self.core.get::<$field_ty>(stringify!($field))
                    }

                    pub fn [<set_ $field>](&mut self, value: $field_ty) -> $crate::Result<()> {
                        if $crate::__store_field_is_primary!($(#[$($field_meta)*])*) {
                            self.core.set_unique(stringify!($field), value)
                        } else {
                            self.core.set(stringify!($field), value)
                        }
                    }
                )*

                $($(
                    pub fn $link(&self) -> $crate::Result<Option<$link_ty>> {
                        self.core.get_link::<$link_ty>(stringify!($link))
                    }

                    pub fn [<set_ $link>](
                        &mut self,
                        value: Option<&mut $link_ty>,
                    ) -> $crate::Result<()> {
                        self.core.set_link(stringify!($link), value)
                    }
                )*)?

                $($(
                    pub fn $list(&self) -> $crate::Result<$crate::ObjectList<$list_ty>> {
                        self.core.get_list::<$list_ty>(stringify!($list))
                    }
                )*)?
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                $crate::Model::same_object(self, other)
            }
        }
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __store_field_is_primary {
    () => {
        false
    };
    (#[primary_key] $($rest:tt)*) => {
        true
    };
    (#[ $($_other:tt)* ] $($rest:tt)*) => {
        $crate::__store_field_is_primary!($($rest)*)
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __store_field_is_indexed {
    () => {
        false
    };
    (#[indexed] $($rest:tt)*) => {
        true
    };
    (#[ $($_other:tt)* ] $($rest:tt)*) => {
        $crate::__store_field_is_indexed!($($rest)*)
    };
}
