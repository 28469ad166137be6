//! # Component System
//!
//! Components are plain data with no behavior. There is no runtime type
//! scanning: every component type is registered explicitly, once, before the
//! ECS is built. Registration order decides the bit each type owns in an
//! archetype signature, and the mapping never changes afterwards.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::storage::{ComponentTable, ErasedTable};
use crate::config::EcsConfig;
use crate::error::{EcsError, EcsResult};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Default`: dense slot 0 of every table is reserved and holds a default
/// - `'static`: tables are stored type-erased and recovered by `TypeId`
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: Default + 'static {}

/// Short type name used in labels and error messages.
pub(crate) fn short_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    // Strip the module path but keep generic arguments intact.
    let base_end = full.find('<').unwrap_or(full.len());
    let start = full[..base_end].rfind("::").map_or(0, |i| i + 2);
    &full[start..]
}

/// Metadata for one registered component type.
#[derive(Clone, Copy)]
pub struct ComponentInfo {
    type_id: TypeId,
    name: &'static str,
    bit: u32,
    make_table: fn(u32, &EcsConfig) -> Box<dyn ErasedTable>,
}

impl ComponentInfo {
    /// Bit owned by this type in archetype signatures.
    #[inline]
    #[must_use]
    pub const fn bit(&self) -> u32 {
        self.bit
    }

    /// Short type name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// `TypeId` of the component.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn create_table(&self, config: &EcsConfig) -> Box<dyn ErasedTable> {
        (self.make_table)(self.bit, config)
    }
}

fn make_table<T: Component>(bit: u32, config: &EcsConfig) -> Box<dyn ErasedTable> {
    Box::new(ComponentTable::<T>::with_capacity(
        bit,
        config.initial_table_capacity,
        config.initial_entity_capacity,
    ))
}

/// Static type → bit mapping.
///
/// # Example
///
/// ```rust,ignore
/// let mut components = ComponentRegistry::new();
/// components.register::<Position>();
/// components.register::<Size>();
/// assert_eq!(components.bit_of::<Size>(), Some(1));
/// ```
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    bits: HashMap<TypeId, u32>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` and returns its bit. Registering the same type twice
    /// returns the bit it already owns.
    pub fn register<T: Component>(&mut self) -> u32 {
        let type_id = TypeId::of::<T>();
        if let Some(&bit) = self.bits.get(&type_id) {
            tracing::warn!(component = short_name::<T>(), bit, "component registered twice");
            return bit;
        }

        let bit = u32::try_from(self.infos.len()).unwrap_or_else(|_| {
            panic!("too many component types registered")
        });
        self.bits.insert(type_id, bit);
        self.infos.push(ComponentInfo {
            type_id,
            name: short_name::<T>(),
            bit,
            make_table: make_table::<T>,
        });
        bit
    }

    /// Number of registered component types (signature width).
    #[inline]
    #[must_use]
    pub fn len(&self) -> u32 {
        // `register` guarantees this fits.
        self.infos.len() as u32
    }

    /// Checks if no type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Bit of `T`, if registered.
    #[inline]
    #[must_use]
    pub fn bit_of<T: Component>(&self) -> Option<u32> {
        self.bits.get(&TypeId::of::<T>()).copied()
    }

    /// Bit of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn try_bit_of<T: Component>(&self) -> EcsResult<u32> {
        self.bit_of::<T>().ok_or(EcsError::UnregisteredComponent {
            component: short_name::<T>(),
        })
    }

    /// Bit of `T`; querying an unregistered type is a programming error.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    #[must_use]
    pub fn expect_bit<T: Component>(&self) -> u32 {
        match self.try_bit_of::<T>() {
            Ok(bit) => bit,
            Err(err) => panic!("{err}"),
        }
    }

    /// Metadata for a bit.
    #[must_use]
    pub fn info(&self, bit: u32) -> Option<&ComponentInfo> {
        self.infos.get(bit as usize)
    }

    /// All registered types, in bit order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}
