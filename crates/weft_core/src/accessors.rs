//! Typed accessors over the generic state contract

/// Declare a trait of typed getter/setter pairs implemented for
/// [`Component`](crate::Component).
///
/// Getters read the committed snapshot; setters go through `set_state`.
///
/// ```rust
/// use weft_core::{state_accessors, Chain, MemoryRegistry, Runtime};
///
/// state_accessors! {
///     pub trait CounterState {
///         "count" => count / set_count: i64,
///     }
/// }
///
/// let mut runtime = Runtime::new();
/// let counter = runtime.create(Chain::new());
/// counter.mount(MemoryRegistry::new()).unwrap();
/// counter.set_count(3).unwrap();
///
/// // Committed by the next pass
/// assert_eq!(counter.count(), None);
/// runtime.run_until_idle();
/// assert_eq!(counter.count(), Some(3));
/// ```
#[macro_export]
macro_rules! state_accessors {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident {
            $( $(#[$field_meta:meta])* $key:literal => $get:ident / $set:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis trait $name {
            $(
                $(#[$field_meta])*
                fn $get(&self) -> ::core::option::Option<$ty>;
                fn $set(&self, value: $ty) -> ::core::result::Result<(), $crate::RuntimeError>;
            )*
        }

        impl $name for $crate::Component {
            $(
                fn $get(&self) -> ::core::option::Option<$ty> {
                    self.get_field::<$ty>($key)
                }

                fn $set(&self, value: $ty) -> ::core::result::Result<(), $crate::RuntimeError> {
                    self.set_field($key, value)
                }
            )*
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::target::MemoryRegistry;
    use crate::{Chain, Runtime};

    state_accessors! {
        trait Selection {
            /// Index of the selected item
            "selectedIndex" => selected_index / set_selected_index: i64,
            "label" => label / set_label: String,
        }
    }

    #[test]
    fn test_accessors_round_through_a_pass() {
        let mut runtime = Runtime::new();
        let component = runtime.create(Chain::new());
        component.mount(MemoryRegistry::new()).unwrap();

        component.set_selected_index(2).unwrap();
        component.set_label("two".to_string()).unwrap();
        assert_eq!(component.selected_index(), None);

        runtime.run_until_idle();
        assert_eq!(component.selected_index(), Some(2));
        assert_eq!(component.label().as_deref(), Some("two"));
    }
}
